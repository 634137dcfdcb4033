//! Tally Starter Kit - Server Side
//!
//! Renders the home page with its count already loaded and serves the
//! wasm-pack output from `./pkg`.

#![cfg(not(target_arch = "wasm32"))]

use starter::routes::Home;
use starter::{APP_TITLE, BUNDLE_NAME};
use tally::ServerConfig;
use tokio::task::LocalSet;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = ServerConfig::default()
        .title(APP_TITLE)
        .bundle(BUNDLE_NAME)
        .static_dir("./pkg");

    info!("Starting Tally Starter Kit on http://{}/", config.addr);

    // Store handles are single-threaded, so connections run on a LocalSet
    LocalSet::new()
        .run_until(tally::server::serve(config, Home::default))
        .await?;

    Ok(())
}
