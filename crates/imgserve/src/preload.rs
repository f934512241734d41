//! Warm the metadata cache with every image in the served directory

use crate::types::PreloadSummary;
use image_info::MetadataCache;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// Extract metadata for each regular file at the top of the cache directory.
///
/// Files are processed one at a time so startup does not fan out into one
/// qemu-img process per image. Failures are logged and counted, not fatal.
pub async fn preload(cache: Arc<MetadataCache>) -> std::io::Result<PreloadSummary> {
    let mut summary = PreloadSummary::default();
    let mut dir = fs::read_dir(cache.directory()).await?;

    while let Some(entry) = dir.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            debug!(file = ?entry.file_name(), "Skipping non UTF-8 file name");
            continue;
        };

        match cache.get_or_populate(&name).await {
            Ok(_) => summary.loaded += 1,
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to preload image info");
                summary.failed += 1;
            }
        }
    }

    info!(
        loaded = summary.loaded,
        failed = summary.failed,
        "Preloaded image info"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image_info::{ExtractError, MetadataDocument, MetadataExtractor};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Accepts `.qcow2` files only
    struct Qcow2Extractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataExtractor for Qcow2Extractor {
        async fn extract(
            &self,
            directory: &Path,
            name: &str,
        ) -> image_info::Result<MetadataDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if name.ends_with(".qcow2") {
                MetadataDocument::from_json(br#"{"virtual-size": 65536}"#.to_vec())
            } else {
                Err(ExtractError::Parse(format!(
                    "{} is not an image",
                    directory.join(name).display()
                )))
            }
        }
    }

    #[tokio::test]
    async fn test_preload_populates_regular_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.qcow2"), b"a").unwrap();
        std::fs::write(dir.path().join("b.qcow2"), b"b").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"c").unwrap();
        std::fs::create_dir(dir.path().join("nested.qcow2")).unwrap();

        let extractor = Arc::new(Qcow2Extractor {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(MetadataCache::new(dir.path(), extractor.clone()));

        let summary = preload(cache.clone()).await.unwrap();

        assert_eq!(summary, PreloadSummary { loaded: 2, failed: 1 });
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
        assert!(cache.peek("a.qcow2").await.is_some());
        assert!(cache.peek("b.qcow2").await.is_some());
        assert!(cache.peek("notes.txt").await.is_none());
        assert!(cache.peek("nested.qcow2").await.is_none());
    }

    #[tokio::test]
    async fn test_preload_missing_directory() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(Qcow2Extractor {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(MetadataCache::new(dir.path().join("gone"), extractor));

        assert!(preload(cache).await.is_err());
    }
}
