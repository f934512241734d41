//! imgserve - static image server with cached qemu-img metadata

use image_info::{MetadataCache, QemuImgExtractor};
use imgserve::{preload, start_server, Result, ServerConfig, ServerState, SharedState};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("imgserve=info".parse()?)
        .add_directive("image_info=info".parse()?);

    // Use JSON format for log collectors when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    let config = ServerConfig::from_args();
    config.validate()?;
    info!("Port: {}", config.port);
    info!("Directory: {:?}", config.directory);
    info!(
        "qemu-img: {:?} (timeout {}s)",
        config.qemu_img,
        config.extract_timeout.as_secs()
    );

    let extractor = QemuImgExtractor::with_program(config.qemu_img.clone(), config.extract_timeout);
    let cache = Arc::new(MetadataCache::new(
        config.directory.clone(),
        Arc::new(extractor),
    ));

    let state: SharedState = Arc::new(ServerState::new(cache.clone(), config.speed_tracking));

    if config.preload {
        tokio::spawn(async move {
            if let Err(e) = preload(cache).await {
                error!("Preloading image info failed: {}", e);
            }
        });
    }

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}
