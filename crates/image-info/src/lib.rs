//! Image metadata extraction and caching
//!
//! Runs `qemu-img info --output=json` against images in a directory and
//! memoizes the resulting JSON documents in memory. Concurrent requests for
//! the same image share a single extraction, and failed extractions are
//! retried on the next request. Cached sizes also feed download speed
//! estimates.

mod cache;
mod error;
mod extractor;
mod speed;
mod types;

pub use cache::MetadataCache;
pub use error::{ExtractError, Result, SpeedError};
pub use extractor::{image_path, MetadataExtractor, QemuImgExtractor};
pub use speed::{bytes_per_second, to_kilobytes, SpeedTracker};
pub use types::{CacheStats, MetadataDocument};
