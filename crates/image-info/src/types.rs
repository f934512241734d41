//! Core types for image metadata

use crate::error::{ExtractError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const VIRTUAL_SIZE_FIELD: &str = "virtual-size";

/// A metadata document as emitted by the extraction tool.
///
/// The raw bytes are kept verbatim so they can be served without
/// re-encoding. Construction validates that the bytes are a JSON object
/// with a non-negative numeric `virtual-size`, which is cached alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDocument {
    raw: Arc<[u8]>,
    virtual_size: u64,
}

impl MetadataDocument {
    /// Validate tool output and wrap it as a document
    pub fn from_json(raw: Vec<u8>) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(&raw)?;

        let object = value
            .as_object()
            .ok_or_else(|| ExtractError::Parse("expected a JSON object".to_string()))?;

        let size = object.get(VIRTUAL_SIZE_FIELD).ok_or_else(|| {
            ExtractError::Parse(format!("missing '{}' field", VIRTUAL_SIZE_FIELD))
        })?;

        let virtual_size = match size.as_u64() {
            Some(n) => n,
            None => match size.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => f as u64,
                _ => {
                    return Err(ExtractError::Parse(format!(
                        "'{}' is not a non-negative number: {}",
                        VIRTUAL_SIZE_FIELD, size
                    )))
                }
            },
        };

        Ok(Self {
            raw: raw.into(),
            virtual_size,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Size in bytes of the resource described by the document
    pub fn virtual_size(&self) -> u64 {
        self.virtual_size
    }
}

/// Statistics about the metadata cache.
///
/// `misses` counts every lookup that found no entry, including callers that
/// waited on an extraction started by someone else; `extractions` counts
/// actual tool runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub extractions: u64,
    pub failures: u64,
}
