//! gRPC handler for the direct server binding.
//!
//! [`ShippingGrpcService`] implements the generated [`ShippingService`] trait
//! using the return-value convention: each method hands back a
//! [`tonic::Response`]. All business logic lives in [`ConsignmentService`];
//! this layer only derives the request context, maps errors onto
//! [`Status`] and records telemetry.

use crate::server::telemetry::{
    increment_consignments_created, increment_request_errors, increment_requests,
    record_request_duration,
};
use consignment_core::{
    ConsignmentService, Error, Repository,
    proto::{self, Consignment, GetRequest, shipping_service_server::ShippingService},
};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

/// Direct tonic binding over a shared [`ConsignmentService`].
///
/// Every request runs with a child of `shutdown` as its context, so
/// cancelling `shutdown` aborts in-flight creates.
pub struct ShippingGrpcService<R> {
    service: ConsignmentService<R>,
    shutdown: CancellationToken,
}

impl<R> Clone for ShippingGrpcService<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<R: Repository> ShippingGrpcService<R> {
    pub const fn new(service: ConsignmentService<R>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }

    fn request_context(&self) -> Result<CancellationToken, Error> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }
        Ok(self.shutdown.child_token())
    }
}

#[tonic::async_trait]
impl<R: Repository> ShippingService for ShippingGrpcService<R> {
    #[tracing::instrument(skip_all, fields(remote = ?req.remote_addr(), weight = req.get_ref().weight))]
    async fn create_consignment(
        &self,
        req: Request<Consignment>,
    ) -> Result<Response<proto::Response>, Status> {
        const METHOD: &str = "CreateConsignment";
        let start = Instant::now();
        increment_requests(METHOD);

        let result = match self.request_context() {
            Ok(ctx) => {
                self.service
                    .create_consignment(&ctx, req.into_inner())
                    .await
            }
            Err(e) => Err(e),
        };
        record_request_duration(METHOD, start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(res) => {
                increment_consignments_created();
                tracing::debug!("consignment created");
                Ok(Response::new(res))
            }
            Err(e) => {
                increment_request_errors(METHOD);
                tracing::warn!("create failed: {e}");
                Err(e.into())
            }
        }
    }

    #[tracing::instrument(skip_all, fields(remote = ?req.remote_addr()))]
    async fn get_consignments(
        &self,
        req: Request<GetRequest>,
    ) -> Result<Response<proto::Response>, Status> {
        const METHOD: &str = "GetConsignments";
        let start = Instant::now();
        increment_requests(METHOD);

        let ctx = self.shutdown.child_token();
        let res = self.service.get_consignments(&ctx, req.into_inner()).await;
        record_request_duration(METHOD, start.elapsed().as_secs_f64() * 1000.0);

        tracing::debug!(count = res.consignments.len(), "consignments listed");
        Ok(Response::new(res))
    }
}
