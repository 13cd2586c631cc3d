//! Managed binding: registers the consignment service under a logical name
//! and version and lets the framework choose the listener. Malformed options
//! and bind, registration or run failures are logged; the process still exits
//! cleanly. Unknown flags are rejected by the argument parser.

use clap::Parser;
use consignment_core::{ConsignmentService, InMemoryRepository};
use consignment_server::server::{
    config::MicroArgs,
    managed::{build_micro_service, default_options, start},
    shutdown::shutdown_signal,
    telemetry::init_telemetry,
};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let providers = init_telemetry()?;

    let repo = Arc::new(InMemoryRepository::new());
    let srv = build_micro_service(default_options(), ConsignmentService::new(repo));

    start(srv, MicroArgs::parse(), shutdown_signal()).await;

    providers.shutdown();
    Ok(())
}
