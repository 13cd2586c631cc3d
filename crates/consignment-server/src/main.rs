//! Direct binding: serves `ShippingService` on a fixed TCP address with
//! reflection and health checks. Failing to bind or serve is fatal.

use anyhow::Context;
use clap::Parser;
use consignment_core::{ConsignmentService, InMemoryRepository};
use consignment_server::server::{
    config::{CliArgs, ServerConfig},
    service::run_server_with_incoming,
    shutdown::shutdown_signal,
    telemetry::init_telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let listener = match TcpListener::bind(config.server_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to listen on {}: {e}", config.server_addr);
            return Err(e).context("failed to listen");
        }
    };
    log_startup_info(&config);

    let repo = Arc::new(InMemoryRepository::new());
    let service = ConsignmentService::new(repo);

    let served = run_server_with_incoming(
        TcpListenerStream::new(listener),
        service,
        &config,
        CancellationToken::new(),
        shutdown_signal(),
    )
    .await;

    if let Err(e) = &served {
        tracing::error!("failed to serve: {e:#}");
    }
    providers.shutdown();
    served.context("failed to serve")
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting consignment service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!("Starting consignment service on {}", config.server_addr);
    }
}
