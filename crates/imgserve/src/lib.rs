//! Image Server Library
//!
//! Serves a directory of images over HTTP and answers `/info/{name}` with
//! the image's cached `qemu-img info` JSON.

pub mod config;
pub mod error;
pub mod preload;
pub mod server;
pub mod timing;
pub mod types;

pub use config::{Cli, ServerConfig};
pub use error::{InfoError, Result, ServerError};
pub use preload::preload;
pub use server::{create_router, start_server, ServerState, SharedState};
pub use types::*;
