//! In-memory metadata cache with single-flight population

use crate::error::ExtractError;
use crate::extractor::MetadataExtractor;
use crate::types::{CacheStats, MetadataDocument};
use moka::future::Cache;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Metadata documents keyed by image name.
///
/// Entries are never evicted or overwritten. Concurrent misses for the same
/// name share one extraction; failed extractions are not cached.
pub struct MetadataCache {
    directory: PathBuf,
    extractor: Arc<dyn MetadataExtractor>,
    entries: Cache<String, MetadataDocument>,
    hits: AtomicU64,
    misses: AtomicU64,
    extractions: AtomicU64,
    failures: AtomicU64,
}

impl MetadataCache {
    pub fn new(directory: impl Into<PathBuf>, extractor: Arc<dyn MetadataExtractor>) -> Self {
        // No capacity bound and no TTL
        let entries = Cache::builder().build();

        Self {
            directory: directory.into(),
            extractor,
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            extractions: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Return the cached document for `name`, extracting it on a miss
    pub async fn get_or_populate(
        &self,
        name: &str,
    ) -> Result<MetadataDocument, Arc<ExtractError>> {
        if let Some(document) = self.entries.get(name).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(name, "Image info cache hit");
            return Ok(document);
        }
        // Callers waiting on another caller's extraction also count as misses
        self.misses.fetch_add(1, Ordering::Relaxed);

        let entry = self
            .entries
            .entry_by_ref(name)
            .or_try_insert_with(self.populate(name))
            .await?;
        Ok(entry.into_value())
    }

    /// Look up `name` without ever triggering extraction
    pub async fn peek(&self, name: &str) -> Option<MetadataDocument> {
        self.entries.get(name).await
    }

    pub async fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks().await;

        CacheStats {
            entries: self.entries.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            extractions: self.extractions.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    async fn populate(&self, name: &str) -> Result<MetadataDocument, ExtractError> {
        self.extractions.fetch_add(1, Ordering::Relaxed);
        info!(name, "info about image not cached, extracting");

        let result = self.extractor.extract(&self.directory, name).await;
        if let Err(e) = &result {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!(name, error = %e, "Failed to extract image info");
        }
        result
    }
}
