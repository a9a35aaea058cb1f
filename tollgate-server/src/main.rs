mod actor;
mod config;
mod metrics;
mod store;
mod transport;
mod types;


use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::metrics::Metrics;
use crate::transport::{Transport, http::HttpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("tollgate={}", config.log_level).parse()?),
        )
        .init();

    // Build the tier registry and spawn the admission actor; invalid
    // policy values abort startup here
    let limiter = store::create_admission(&config)?;
    let metrics = Arc::new(Metrics::new());

    let mut transport_tasks = JoinSet::new();

    {
        let limiter_handle = limiter.clone();
        let metrics = metrics.clone();
        let host = config.http.host.clone();
        let port = config.http.port;

        transport_tasks.spawn(async move {
            tracing::info!("Starting HTTP transport on {}:{}", host, port);
            let transport = HttpTransport::new(&host, port);
            transport.start(limiter_handle, metrics).await
        });
    }

    tracing::info!(
        "Tollgate server started with store type: {:?}, default tier: {}, fallback: {:?}",
        config.store.store_type,
        config.limits.default_tier,
        config.limits.fallback
    );
    tracing::info!(
        "Store capacity: {}, Buffer size: {}",
        config.store.capacity,
        config.buffer_size
    );

    // Wait for all transport tasks to complete (they run indefinitely)
    while let Some(result) = transport_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {
                tracing::info!("Transport task completed successfully");
            }
            Ok(Err(e)) => {
                tracing::error!("Transport task failed: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Transport task panicked: {}", e);
                return Err(anyhow::anyhow!("Transport task panicked"));
            }
        }
    }

    Ok(())
}
