//! # Media Configuration Controller
//!
//! Entry point. Bootstraps the runtime and runs one controller per kind
//! until a shutdown signal arrives.

use anyhow::Result;
use media_config_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.contexts, init.server_state, init.config).await
}
