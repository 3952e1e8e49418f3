//! Persisted embedding cache keyed by a fingerprint of (model identity, catalog id set),
//! plus the memoizing loader that hands out one shared index per process.

use anyhow::{Context, Result};
use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::embedder::Embedder;
use super::index::{EmbeddingIndex, EmbeddingRecord};
use crate::catalog::QueryCatalog;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexFingerprint(String);

impl IndexFingerprint {
    pub fn compute(model_id: &str, catalog: &QueryCatalog) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(model_id.as_bytes());
        for id in catalog.sorted_ids() {
            hasher.update(b"\n");
            hasher.update(id.as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Valid blob found and reused as-is
    Hit,
    /// Embedded from scratch and written to the cache path
    Rebuilt,
    /// No cache path configured
    Disabled,
}

#[derive(Serialize, Deserialize)]
struct CachedIndex {
    fingerprint: IndexFingerprint,
    model_id: String,
    records: Vec<EmbeddingRecord>,
}

fn read_cache(path: &Path, expected: &IndexFingerprint) -> Option<CachedIndex> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No embedding cache at {}", path.display());
            return None;
        }
        Err(e) => {
            warn!("Failed to read embedding cache {}: {}", path.display(), e);
            return None;
        }
    };

    let cached: CachedIndex = match bincode::deserialize(&bytes) {
        Ok(cached) => cached,
        Err(e) => {
            warn!("Embedding cache {} is unreadable, rebuilding: {}", path.display(), e);
            return None;
        }
    };

    if &cached.fingerprint != expected {
        info!(
            "Embedding cache {} is stale (model {}), rebuilding",
            path.display(),
            cached.model_id
        );
        return None;
    }
    Some(cached)
}

fn write_cache(path: &Path, cached: &CachedIndex) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
    }
    let bytes = bincode::serialize(cached).context("Failed to encode embedding cache")?;

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to move cache into {}", path.display()))?;
    Ok(())
}

/// Reuse a valid cached blob or embed the catalog again. With `force` the cache
/// is ignored and rewritten.
pub fn build_or_load(
    catalog: &QueryCatalog,
    embedder: Arc<dyn Embedder>,
    cache_path: Option<&Path>,
    cache_capacity: u64,
    force: bool,
) -> Result<(EmbeddingIndex, CacheOutcome)> {
    let fingerprint = IndexFingerprint::compute(embedder.model_id(), catalog);

    let Some(path) = cache_path else {
        let index = EmbeddingIndex::build(catalog, embedder, cache_capacity)?;
        return Ok((index, CacheOutcome::Disabled));
    };

    if !force {
        if let Some(cached) = read_cache(path, &fingerprint) {
            match EmbeddingIndex::from_records(cached.records, embedder.clone(), cache_capacity) {
                Ok(index) => {
                    info!("Loaded {} embeddings from cache {}", index.len(), path.display());
                    return Ok((index, CacheOutcome::Hit));
                }
                Err(e) => warn!("Discarding cached embeddings: {}", e),
            }
        }
    }

    let index = EmbeddingIndex::build(catalog, embedder, cache_capacity)?;
    let cached = CachedIndex {
        fingerprint,
        model_id: index.model_id().to_string(),
        records: index.records().to_vec(),
    };
    match write_cache(path, &cached) {
        Ok(()) => info!("Wrote embedding cache {} ({})", path.display(), cached.fingerprint),
        Err(e) => warn!("Embedding cache not persisted: {:#}", e),
    }
    Ok((index, CacheOutcome::Rebuilt))
}

/// Builds the index on first use and publishes it for every later caller.
pub struct IndexLoader {
    catalog: Arc<QueryCatalog>,
    embedder: Arc<dyn Embedder>,
    cache_path: Option<PathBuf>,
    cache_capacity: u64,
    current: ArcSwapOption<EmbeddingIndex>,
    build_lock: Mutex<()>,
}

impl IndexLoader {
    pub fn new(
        catalog: Arc<QueryCatalog>,
        embedder: Arc<dyn Embedder>,
        cache_path: Option<PathBuf>,
        cache_capacity: u64,
    ) -> Self {
        Self {
            catalog,
            embedder,
            cache_path,
            cache_capacity,
            current: ArcSwapOption::empty(),
            build_lock: Mutex::new(()),
        }
    }

    pub fn fingerprint(&self) -> IndexFingerprint {
        IndexFingerprint::compute(self.embedder.model_id(), &self.catalog)
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn load(&self) -> Result<Arc<EmbeddingIndex>> {
        if let Some(index) = self.current.load_full() {
            return Ok(index);
        }

        let _guard = self.build_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // another caller may have finished the build while we waited
        if let Some(index) = self.current.load_full() {
            return Ok(index);
        }

        let (index, outcome) = self.build(false)?;
        debug!("Index ready ({:?})", outcome);
        Ok(index)
    }

    pub fn rebuild(&self, force: bool) -> Result<(Arc<EmbeddingIndex>, CacheOutcome)> {
        let _guard = self.build_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.build(force)
    }

    fn build(&self, force: bool) -> Result<(Arc<EmbeddingIndex>, CacheOutcome)> {
        let (index, outcome) = build_or_load(
            &self.catalog,
            self.embedder.clone(),
            self.cache_path.as_deref(),
            self.cache_capacity,
            force,
        )?;
        let index = Arc::new(index);
        self.current.store(Some(index.clone()));
        Ok((index, outcome))
    }
}
