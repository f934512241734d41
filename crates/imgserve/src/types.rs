//! Core types for the image server

use image_info::CacheStats;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache: CacheStats,
    pub downloads: DownloadCounts,
}

/// Timed static downloads since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadCounts {
    pub finished: u64,
    pub bytes_sent: u64,
    pub speeds_reported: u64,
    pub speeds_skipped: u64,
}

/// Outcome of warming the metadata cache from the served directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    pub loaded: usize,
    pub failed: usize,
}
