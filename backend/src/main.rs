use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use vote_backend::{api, App, Config};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Config::parse();

    let app = Arc::new(App::init(&config).await);
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl_c");
        }
    };

    let served = api::serve(app.clone(), config.bind, shutdown)
        .await
        .with_context(|| format!("http server on {} failed", config.bind));
    app.shutdown().await;
    served
}
