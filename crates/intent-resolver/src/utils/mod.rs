//! Utilities module - text normalization shared by the detectors and prompt rendering

pub mod text_utils;

pub use text_utils::TextUtils;
