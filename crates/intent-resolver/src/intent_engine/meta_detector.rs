// intent-resolver/crates/intent-resolver/src/intent_engine/meta_detector.rs

use tracing::debug;

use super::keyword_tables::SYSTEM_INFO_PATTERNS;
use crate::catalog::SystemInfoKind;
use crate::utils::TextUtils;

/// Classify questions about the system itself ("which zones do you cover?").
pub fn detect_system_info(question: &str) -> Option<SystemInfoKind> {
    let words = TextUtils::words(question);
    for (kind, patterns) in SYSTEM_INFO_PATTERNS.iter() {
        if let Some(pattern) = TextUtils::find_phrase(&words, patterns) {
            debug!("System info question ({}) matched '{}'", kind.as_str(), pattern);
            return Some(*kind);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_each_kind() {
        assert_eq!(detect_system_info("Which project are you using?"), Some(SystemInfoKind::Project));
        assert_eq!(detect_system_info("What zones do you cover?"), Some(SystemInfoKind::Locations));
        assert_eq!(detect_system_info("What can you do?"), Some(SystemInfoKind::Capabilities));
        assert_eq!(detect_system_info("Tell me your capabilities"), Some(SystemInfoKind::Capabilities));
    }

    #[test]
    fn test_data_questions_are_not_meta() {
        assert_eq!(detect_system_info("Peak probability of GSI above 0.6 in 14 days"), None);
        assert_eq!(detect_system_info("same but for houston"), None);
        assert_eq!(detect_system_info(""), None);
    }

    #[test]
    fn test_project_patterns_win_over_capabilities() {
        assert_eq!(detect_system_info("what data do you have?"), Some(SystemInfoKind::Project));
    }
}
