//! `ShippingService` bindings for the managed framework.
//!
//! Handlers registered with a [`MicroServer`] fill in a caller-allocated
//! response instead of returning one. [`register_shipping_service_handler`]
//! wraps such a handler in an adapter that implements the generated tonic
//! trait, so the framework's server can route to it.

use super::MicroServer;
use crate::server::telemetry::{
    increment_request_errors, increment_requests, record_request_duration,
};
use consignment_core::{
    Error,
    proto::{
        self, Consignment, GetRequest,
        shipping_service_server::{ShippingService, ShippingServiceServer},
    },
};
use std::{sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, server::NamedService};

/// Out-parameter form of the `ShippingService` contract.
///
/// The framework allocates a default [`proto::Response`], passes it as `res`
/// and sends it back only if the method returns `Ok`.
#[tonic::async_trait]
pub trait ShippingServiceHandler: Send + Sync + 'static {
    async fn create_consignment(
        &self,
        ctx: &CancellationToken,
        req: Consignment,
        res: &mut proto::Response,
    ) -> consignment_core::Result<()>;

    async fn get_consignments(
        &self,
        ctx: &CancellationToken,
        req: GetRequest,
        res: &mut proto::Response,
    ) -> consignment_core::Result<()>;
}

/// Adds `handler` to `server`'s routes and endpoint list.
pub fn register_shipping_service_handler<H: ShippingServiceHandler>(
    server: &mut MicroServer,
    handler: H,
) {
    let adapter = HandlerAdapter {
        handler: Arc::new(handler),
        shutdown: server.shutdown.clone(),
    };
    server.routes.add_service(ShippingServiceServer::new(adapter));
    server
        .endpoints
        .push(<ShippingServiceServer<HandlerAdapter<H>> as NamedService>::NAME.to_string());
}

struct HandlerAdapter<H> {
    handler: Arc<H>,
    shutdown: CancellationToken,
}

impl<H> HandlerAdapter<H> {
    fn request_context(&self) -> Result<CancellationToken, Error> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }
        Ok(self.shutdown.child_token())
    }
}

#[tonic::async_trait]
impl<H: ShippingServiceHandler> ShippingService for HandlerAdapter<H> {
    #[tracing::instrument(skip_all, fields(remote = ?req.remote_addr()))]
    async fn create_consignment(
        &self,
        req: Request<Consignment>,
    ) -> Result<Response<proto::Response>, Status> {
        const METHOD: &str = "CreateConsignment";
        let start = Instant::now();
        increment_requests(METHOD);

        let mut res = proto::Response::default();
        let outcome = match self.request_context() {
            Ok(ctx) => {
                self.handler
                    .create_consignment(&ctx, req.into_inner(), &mut res)
                    .await
            }
            Err(e) => Err(e),
        };
        record_request_duration(METHOD, start.elapsed().as_secs_f64() * 1000.0);

        if let Err(e) = outcome {
            increment_request_errors(METHOD);
            tracing::warn!("create failed: {e}");
            return Err(e.into());
        }
        Ok(Response::new(res))
    }

    #[tracing::instrument(skip_all, fields(remote = ?req.remote_addr()))]
    async fn get_consignments(
        &self,
        req: Request<GetRequest>,
    ) -> Result<Response<proto::Response>, Status> {
        const METHOD: &str = "GetConsignments";
        let start = Instant::now();
        increment_requests(METHOD);

        let mut res = proto::Response::default();
        let ctx = self.shutdown.child_token();
        let outcome = self
            .handler
            .get_consignments(&ctx, req.into_inner(), &mut res)
            .await;
        record_request_duration(METHOD, start.elapsed().as_secs_f64() * 1000.0);

        if let Err(e) = outcome {
            increment_request_errors(METHOD);
            return Err(e.into());
        }
        Ok(Response::new(res))
    }
}
