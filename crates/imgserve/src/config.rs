//! Command line and environment configuration

use crate::error::{Result, ServerError};
use clap::Parser;
use image_info::QemuImgExtractor;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "imgserve", version)]
#[command(about = "Serve image files over HTTP with cached qemu-img metadata")]
pub struct Cli {
    /// Port to serve on
    #[arg(short, long, env = "PORT", default_value_t = 8001)]
    pub port: u16,

    /// The directory of image files
    #[arg(short = 'D', long, env = "IMGSERVE_DIRECTORY", default_value = ".")]
    pub directory: PathBuf,

    /// qemu-img binary used to extract image metadata
    #[arg(long, env = "QEMU_IMG", default_value = QemuImgExtractor::DEFAULT_PROGRAM)]
    pub qemu_img: PathBuf,

    /// Seconds before a qemu-img invocation is killed
    #[arg(
        long = "extract-timeout",
        env = "EXTRACT_TIMEOUT_SECS",
        default_value_t = QemuImgExtractor::DEFAULT_TIMEOUT_SECS
    )]
    pub extract_timeout_secs: u64,

    /// Extract metadata for every image in the directory at startup
    #[arg(long, env = "IMGSERVE_PRELOAD")]
    pub preload: bool,

    /// Do not time downloads or log their average speed
    #[arg(long)]
    pub no_speed_tracking: bool,
}

/// Resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub directory: PathBuf,
    pub qemu_img: PathBuf,
    pub extract_timeout: Duration,
    pub preload: bool,
    pub speed_tracking: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            directory: PathBuf::from("."),
            qemu_img: PathBuf::from(QemuImgExtractor::DEFAULT_PROGRAM),
            extract_timeout: Duration::from_secs(QemuImgExtractor::DEFAULT_TIMEOUT_SECS),
            preload: false,
            speed_tracking: true,
        }
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            directory: cli.directory,
            qemu_img: cli.qemu_img,
            extract_timeout: Duration::from_secs(cli.extract_timeout_secs),
            preload: cli.preload,
            speed_tracking: !cli.no_speed_tracking,
        }
    }
}

impl ServerConfig {
    /// Parse configuration from the command line and environment
    pub fn from_args() -> Self {
        Cli::parse().into()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.directory.is_dir() {
            return Err(ServerError::Config(format!(
                "{} is not a directory",
                self.directory.display()
            )));
        }
        if self.extract_timeout.is_zero() {
            return Err(ServerError::Config(
                "extract timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
