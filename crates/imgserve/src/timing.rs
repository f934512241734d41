//! Download timing for statically served images
//!
//! Wraps the file service, measures how long each response body takes to
//! stream (or until the client goes away), then logs an average speed from
//! the cached image size on a background task once the transfer is over.

use crate::server::SharedState;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use futures::StreamExt;
use image_info::{to_kilobytes, SpeedTracker};
use crate::types::DownloadCounts;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Start of a single download
#[derive(Debug)]
pub struct RequestTiming {
    started: Instant,
    path: String,
    client_id: String,
}

impl RequestTiming {
    pub fn start(path: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            started: Instant::now(),
            path: path.into(),
            client_id: client_id.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Image name for a request path: percent-decoded, one leading `/` removed
pub fn image_name(path: &str) -> Option<String> {
    let decoded = urlencoding::decode(path).ok()?;
    let name = decoded.strip_prefix('/').unwrap_or(&decoded);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Average bytes per second for a finished download, or `None` with the
/// reason logged
pub async fn download_speed(
    tracker: &SpeedTracker,
    client_id: &str,
    path: &str,
    elapsed_secs: i64,
) -> Option<u64> {
    if elapsed_secs <= 0 {
        info!(
            client = client_id,
            elapsed_secs, "unexpected duration (no average speed reported)"
        );
        return None;
    }

    let Some(name) = image_name(path) else {
        info!(
            client = client_id,
            path, "unrecognized image name (no average speed reported)"
        );
        return None;
    };

    match tracker.average_speed(&name, elapsed_secs).await {
        Ok(speed) => {
            info!(
                client = client_id,
                image = %name,
                bytes_per_sec = speed,
                "average speed: {} kB/s",
                to_kilobytes(speed)
            );
            Some(speed)
        }
        Err(e) => {
            info!(client = client_id, error = %e, "no average speed reported");
            None
        }
    }
}

/// Counters for finished downloads and their speed reports
#[derive(Debug, Default)]
pub struct DownloadStats {
    finished: AtomicU64,
    bytes_sent: AtomicU64,
    speeds_reported: AtomicU64,
    speeds_skipped: AtomicU64,
}

impl DownloadStats {
    pub fn counts(&self) -> DownloadCounts {
        DownloadCounts {
            finished: self.finished.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            speeds_reported: self.speeds_reported.load(Ordering::Relaxed),
            speeds_skipped: self.speeds_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Lives inside the response body; dropping it marks the download finished
struct DownloadGuard {
    timing: RequestTiming,
    tracker: SpeedTracker,
    stats: Arc<DownloadStats>,
    bytes_sent: u64,
}

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        let elapsed = self.timing.elapsed();
        info!(
            client = self.timing.client_id(),
            elapsed = ?elapsed,
            bytes_sent = self.bytes_sent,
            "download FINISH"
        );
        self.stats.finished.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_sent
            .fetch_add(self.bytes_sent, Ordering::Relaxed);

        // Dropped outside a runtime only during shutdown
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let tracker = self.tracker.clone();
        let stats = self.stats.clone();
        let client_id = self.timing.client_id().to_string();
        let path = self.timing.path().to_string();
        let elapsed_secs = elapsed.as_secs() as i64;
        handle.spawn(async move {
            let counter = match download_speed(&tracker, &client_id, &path, elapsed_secs).await {
                Some(_) => &stats.speeds_reported,
                None => &stats.speeds_skipped,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        });
    }
}

fn client_id(req: &Request) -> String {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!("clientID: {}", peer)
}

/// Middleware timing the static file service
pub async fn track_download(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Response {
    let timing = RequestTiming::start(req.uri().path(), client_id(&req));
    info!(client = timing.client_id(), path = timing.path(), "download BEGIN");

    let response = next.run(req).await;

    let mut guard = DownloadGuard {
        timing,
        tracker: state.speed.clone(),
        stats: state.downloads.clone(),
        bytes_sent: 0,
    };
    let (parts, body) = response.into_parts();
    let body = body.into_data_stream().inspect(move |chunk| {
        let _ = &guard;
        if let Ok(bytes) = chunk {
            guard.bytes_sent += bytes.len() as u64;
        }
    });

    Response::from_parts(parts, Body::from_stream(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image_info::{MetadataCache, MetadataDocument, MetadataExtractor};
    use std::path::Path;
    use std::sync::Arc;

    struct GigabyteExtractor;

    #[async_trait]
    impl MetadataExtractor for GigabyteExtractor {
        async fn extract(
            &self,
            _directory: &Path,
            _name: &str,
        ) -> image_info::Result<MetadataDocument> {
            MetadataDocument::from_json(br#"{"virtual-size": 1000000000}"#.to_vec())
        }
    }

    fn tracker() -> (SpeedTracker, Arc<MetadataCache>) {
        let cache = Arc::new(MetadataCache::new("/images", Arc::new(GigabyteExtractor)));
        (SpeedTracker::new(cache.clone()), cache)
    }

    #[test]
    fn test_image_name() {
        assert_eq!(image_name("/disk.qcow2"), Some("disk.qcow2".to_string()));
        assert_eq!(image_name("/my%20disk.img"), Some("my disk.img".to_string()));
        assert_eq!(image_name("/nested/disk.raw"), Some("nested/disk.raw".to_string()));
        assert_eq!(image_name("/"), None);
        assert_eq!(image_name(""), None);
    }

    #[test]
    fn test_request_timing() {
        let timing = RequestTiming::start("/disk.qcow2", "clientID: 127.0.0.1:5000");
        assert_eq!(timing.path(), "/disk.qcow2");
        assert_eq!(timing.client_id(), "clientID: 127.0.0.1:5000");
        assert_eq!(timing.elapsed().as_secs(), 0);
    }

    #[tokio::test]
    async fn test_download_speed_for_cached_image() {
        let (tracker, cache) = tracker();
        cache.get_or_populate("disk.qcow2").await.unwrap();

        let speed = download_speed(&tracker, "clientID: test", "/disk.qcow2", 10).await;
        assert_eq!(speed, Some(100_000_000));
    }

    #[tokio::test]
    async fn test_download_speed_skips_non_positive_duration() {
        let (tracker, cache) = tracker();
        cache.get_or_populate("disk.qcow2").await.unwrap();

        assert_eq!(download_speed(&tracker, "c", "/disk.qcow2", 0).await, None);
        assert_eq!(download_speed(&tracker, "c", "/disk.qcow2", -1).await, None);
    }

    #[tokio::test]
    async fn test_download_speed_skips_unknown_and_empty_names() {
        let (tracker, cache) = tracker();

        assert_eq!(download_speed(&tracker, "c", "/disk.qcow2", 10).await, None);
        assert_eq!(download_speed(&tracker, "c", "/", 10).await, None);
        // Serving a file must never extract its metadata
        assert!(cache.peek("disk.qcow2").await.is_none());
    }
}
