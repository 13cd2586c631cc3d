//! Managed-service binding of the consignment service.
//!
//! [`ConsignmentHandler`] satisfies the framework's out-parameter
//! [`ShippingServiceHandler`] convention by delegating to the same
//! [`ConsignmentService`] the direct binding uses.

use crate::server::{
    config::MicroArgs,
    micro::{
        MicroService, Options,
        shipping::{ShippingServiceHandler, register_shipping_service_handler},
    },
    telemetry::increment_consignments_created,
};
use consignment_core::{
    ConsignmentService, Repository,
    proto::{self, Consignment, GetRequest},
};
use tokio_util::sync::CancellationToken;

/// Logical name the service registers under unless overridden by
/// `--server-name`.
pub const SERVICE_NAME: &str = "consignment";
pub const SERVICE_VERSION: &str = "latest";

pub struct ConsignmentHandler<R> {
    service: ConsignmentService<R>,
}

impl<R: Repository> ConsignmentHandler<R> {
    pub const fn new(service: ConsignmentService<R>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl<R: Repository> ShippingServiceHandler for ConsignmentHandler<R> {
    async fn create_consignment(
        &self,
        ctx: &CancellationToken,
        req: Consignment,
        res: &mut proto::Response,
    ) -> consignment_core::Result<()> {
        *res = self.service.create_consignment(ctx, req).await?;
        increment_consignments_created();
        Ok(())
    }

    async fn get_consignments(
        &self,
        ctx: &CancellationToken,
        req: GetRequest,
        res: &mut proto::Response,
    ) -> consignment_core::Result<()> {
        *res = self.service.get_consignments(ctx, req).await;
        Ok(())
    }
}

/// Builds the managed service with `service` registered on it. Call
/// [`MicroService::init`] before running to apply command-line overrides.
pub fn build_micro_service<R: Repository>(
    options: Options,
    service: ConsignmentService<R>,
) -> MicroService {
    let mut srv = MicroService::new(options);
    register_shipping_service_handler(srv.server(), ConsignmentHandler::new(service));
    srv
}

/// Applies `args` and runs `srv` until `signal` resolves.
///
/// Nothing is returned: malformed options and bind, registration or serve
/// failures are logged and the caller carries on.
pub async fn start<F>(mut srv: MicroService, args: MicroArgs, signal: F)
where
    F: Future<Output = ()>,
{
    if let Err(e) = srv.apply(args) {
        tracing::error!("invalid service options: {e:#}");
        return;
    }
    if let Err(e) = srv.run_until(signal).await {
        tracing::error!("{e}");
    }
}

/// Options with the default service name and version.
pub fn default_options() -> Options {
    Options::new(SERVICE_NAME, SERVICE_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::micro::registry::{MemoryRegistry, Registry};
    use clap::Parser;
    use consignment_core::{
        InMemoryRepository, proto::shipping_service_client::ShippingServiceClient,
    };
    use core::time::Duration;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    async fn discover(registry: &MemoryRegistry, name: &str) -> String {
        for _ in 0..100 {
            if let Ok(records) = registry.get_service(name) {
                return format!("http://{}", records[0].nodes[0].address);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{name} was never registered");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn registers_serves_and_deregisters() {
        let registry = Arc::new(MemoryRegistry::new());
        let repo = Arc::new(InMemoryRepository::new());
        let options = default_options()
            .with_address("127.0.0.1:0")
            .with_registry(registry.clone());

        let mut srv = build_micro_service(options, ConsignmentService::new(Arc::clone(&repo)));
        srv.init_from(["consignment-micro", "--server-version", "1.0.0"])
            .unwrap();

        let (stop, stopped) = oneshot::channel::<()>();
        let running = tokio::spawn(srv.run_until(async {
            let _ = stopped.await;
        }));

        let endpoint = discover(&registry, SERVICE_NAME).await;
        let record = &registry.get_service(SERVICE_NAME).unwrap()[0];
        assert_eq!(record.version, "1.0.0");
        assert_eq!(record.endpoints, ["consignment.ShippingService"]);

        let mut client = ShippingServiceClient::connect(endpoint).await.unwrap();
        let payload = Consignment {
            weight: 50,
            ..Default::default()
        };
        let created = client
            .create_consignment(payload.clone())
            .await
            .unwrap()
            .into_inner();
        assert!(created.created);
        assert_eq!(created.consignment, Some(payload.clone()));

        let listed = client
            .get_consignments(GetRequest {})
            .await
            .unwrap()
            .into_inner();
        assert_eq!(listed.consignments, vec![payload]);
        assert_eq!(repo.len(), 1);

        drop(client);
        let _ = stop.send(());
        running.await.unwrap().unwrap();
        assert!(registry.get_service(SERVICE_NAME).is_err());
    }

    #[tokio::test]
    async fn bind_failure_is_returned_to_the_caller() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = occupied.local_addr().unwrap().to_string();
        let registry = Arc::new(MemoryRegistry::new());

        let srv = build_micro_service(
            default_options()
                .with_address(address)
                .with_registry(registry.clone()),
            ConsignmentService::new(Arc::new(InMemoryRepository::new())),
        );
        let err = srv.run_until(async {}).await.unwrap_err();

        assert!(matches!(err, crate::server::micro::MicroError::Bind { .. }));
        assert!(registry.list_services().is_empty());
    }

    #[tokio::test]
    async fn start_logs_bind_failure_and_returns() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = occupied.local_addr().unwrap().to_string();
        let registry = Arc::new(MemoryRegistry::new());
        let srv = build_micro_service(
            default_options().with_registry(registry.clone()),
            ConsignmentService::new(Arc::new(InMemoryRepository::new())),
        );
        let args =
            MicroArgs::try_parse_from(["consignment-micro", "--server-address", &address]).unwrap();

        tokio::time::timeout(Duration::from_secs(5), start(srv, args, std::future::pending()))
            .await
            .expect("start must return when the listener cannot be bound");
        assert!(registry.list_services().is_empty());
    }

    #[tokio::test]
    async fn start_logs_malformed_metadata_and_returns() {
        let registry = Arc::new(MemoryRegistry::new());
        let srv = build_micro_service(
            default_options()
                .with_address("127.0.0.1:0")
                .with_registry(registry.clone()),
            ConsignmentService::new(Arc::new(InMemoryRepository::new())),
        );
        let args =
            MicroArgs::try_parse_from(["consignment-micro", "--server-metadata", "bad"]).unwrap();

        tokio::time::timeout(Duration::from_secs(5), start(srv, args, std::future::pending()))
            .await
            .expect("start must return without serving");
        assert!(registry.list_services().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn advertised_address_is_published_instead_of_bound_one() {
        let registry = Arc::new(MemoryRegistry::new());
        let srv = build_micro_service(
            default_options()
                .with_address("127.0.0.1:0")
                .with_advertise("shipping.internal:7000")
                .with_registry(registry.clone()),
            ConsignmentService::new(Arc::new(InMemoryRepository::new())),
        );

        let (stop, stopped) = oneshot::channel::<()>();
        let running = tokio::spawn(srv.run_until(async {
            let _ = stopped.await;
        }));

        assert_eq!(
            discover(&registry, SERVICE_NAME).await,
            "http://shipping.internal:7000"
        );

        let _ = stop.send(());
        running.await.unwrap().unwrap();
        assert!(registry.list_services().is_empty());
    }
}
