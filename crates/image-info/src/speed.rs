//! Average download speed derived from cached image sizes

use crate::cache::MetadataCache;
use crate::error::SpeedError;
use std::sync::Arc;

/// Integer bytes per second for `size` bytes moved in `elapsed_secs` whole seconds
pub fn bytes_per_second(size: u64, elapsed_secs: i64) -> Result<u64, SpeedError> {
    if elapsed_secs <= 0 {
        return Err(SpeedError::NonPositiveDuration(elapsed_secs));
    }
    Ok(size / elapsed_secs as u64)
}

/// Convert bytes per second to decimal kilobytes per second
pub fn to_kilobytes(bytes_per_second: u64) -> u64 {
    bytes_per_second / 1000
}

/// Computes download speeds from the sizes recorded in a [`MetadataCache`].
///
/// Only reads the cache; an image without metadata is reported as unknown
/// rather than extracted.
#[derive(Clone)]
pub struct SpeedTracker {
    cache: Arc<MetadataCache>,
}

impl SpeedTracker {
    pub fn new(cache: Arc<MetadataCache>) -> Self {
        Self { cache }
    }

    /// Average bytes per second for downloading `name` in `elapsed_secs`
    pub async fn average_speed(&self, name: &str, elapsed_secs: i64) -> Result<u64, SpeedError> {
        if elapsed_secs <= 0 {
            return Err(SpeedError::NonPositiveDuration(elapsed_secs));
        }

        let document = self
            .cache
            .peek(name)
            .await
            .ok_or_else(|| SpeedError::UnknownImage(name.to_string()))?;

        bytes_per_second(document.virtual_size(), elapsed_secs)
    }
}
