//! Direct gRPC binding.
//!
//! - [`handler`] - `ShippingService` implementation over the shared
//!   business logic.
//! - [`run_server_with_incoming`] - assembles the tonic server (shipping
//!   service, health, reflection, gRPC-Web) and serves it on any incoming
//!   connection stream until shutdown.

pub mod handler;

use crate::server::config::ServerConfig;
use consignment_core::{
    ConsignmentService, Repository,
    proto::{FILE_DESCRIPTOR_SET, shipping_service_server::ShippingServiceServer},
};
use futures::Stream;
use handler::ShippingGrpcService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Serves the shipping service on `incoming` until `signal` resolves.
///
/// When `signal` fires, health flips to `NOT_SERVING`, `shutdown` is
/// cancelled so in-flight request contexts observe it, and the server drains
/// open connections before returning.
///
/// # Errors
///
/// Returns an error if the reflection service cannot be built or the serve
/// loop fails.
pub async fn run_server_with_incoming<R, I, IO, IE, F>(
    incoming: I,
    service: ConsignmentService<R>,
    config: &ServerConfig,
    shutdown: CancellationToken,
    signal: F,
) -> anyhow::Result<()>
where
    R: Repository,
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<ShippingServiceServer<ShippingGrpcService<R>>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let grpc = ShippingGrpcService::new(service, shutdown.clone());

    let mut builder = Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true));
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(limit) = config.concurrency_limit {
        builder = builder.concurrency_limit_per_connection(limit);
    }

    let on_shutdown = async move {
        signal.await;
        tracing::info!("Shutdown signal received, terminating gracefully...");
        health_reporter
            .set_not_serving::<ShippingServiceServer<ShippingGrpcService<R>>>()
            .await;
        shutdown.cancel();
    };

    builder
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_shipping_service(grpc))
        .serve_with_incoming_shutdown(incoming, on_shutdown)
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn build_shipping_service<R: Repository>(
    service: ShippingGrpcService<R>,
) -> ShippingServiceServer<ShippingGrpcService<R>> {
    ShippingServiceServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}
