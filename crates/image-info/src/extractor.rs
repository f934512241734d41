//! Metadata extraction via `qemu-img info`

use crate::error::{ExtractError, Result};
use crate::types::MetadataDocument;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

/// Source of metadata documents for images in a directory
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Extract the metadata document for `name` under `directory`
    async fn extract(&self, directory: &Path, name: &str) -> Result<MetadataDocument>;
}

/// Build `directory + "/" + name` without normalising either side
pub fn image_path(directory: &Path, name: &str) -> PathBuf {
    let mut path = directory.as_os_str().to_owned();
    path.push("/");
    path.push(name);
    PathBuf::from(path)
}

/// Extractor that shells out to `qemu-img info <path> --output=json`
#[derive(Debug, Clone)]
pub struct QemuImgExtractor {
    program: PathBuf,
    timeout: Duration,
}

impl QemuImgExtractor {
    pub const DEFAULT_PROGRAM: &'static str = "qemu-img";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new() -> Self {
        Self::with_program(
            Self::DEFAULT_PROGRAM,
            Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Use a specific binary and timeout
    pub fn with_program(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for QemuImgExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataExtractor for QemuImgExtractor {
    async fn extract(&self, directory: &Path, name: &str) -> Result<MetadataDocument> {
        let path = image_path(directory, name);
        debug!(path = %path.display(), "Getting qemu-img info");

        // Only a definite "does not exist" short-circuits; anything else is left to the tool
        if let Ok(false) = fs::try_exists(&path).await {
            return Err(ExtractError::NotFound(path));
        }

        let mut command = Command::new(&self.program);
        command
            .arg("info")
            .arg(&path)
            .arg("--output=json")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(
                    path = %path.display(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "qemu-img did not finish in time, killed"
                );
                return Err(ExtractError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            return Err(ExtractError::ToolFailure {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let document = MetadataDocument::from_json(output.stdout)?;
        debug!(
            path = %path.display(),
            virtual_size = document.virtual_size(),
            "Extracted image metadata"
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_image_path_joins_with_slash() {
        assert_eq!(
            image_path(Path::new("/srv/images"), "disk.qcow2"),
            PathBuf::from("/srv/images/disk.qcow2")
        );
        assert_eq!(
            image_path(Path::new("."), "nested/disk.raw"),
            PathBuf::from("./nested/disk.raw")
        );
    }

    #[test]
    fn test_default_extractor() {
        let extractor = QemuImgExtractor::default();
        assert_eq!(extractor.program(), Path::new("qemu-img"));
        assert_eq!(extractor.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        // The program would fail to launch; the existence check must come first
        let extractor =
            QemuImgExtractor::with_program("/nonexistent/qemu-img", Duration::from_secs(1));

        let err = extractor.extract(dir.path(), "missing.img").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unlaunchable_program_is_launch_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("disk.img"), b"data").unwrap();
        let extractor =
            QemuImgExtractor::with_program("/nonexistent/qemu-img", Duration::from_secs(1));

        let err = extractor.extract(dir.path(), "disk.img").await.unwrap_err();
        assert!(matches!(err, ExtractError::Launch(_)));
    }
}
