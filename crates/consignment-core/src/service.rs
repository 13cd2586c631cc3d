//! Transport-agnostic implementation of the `ShippingService` contract.
//!
//! [`ConsignmentService`] turns RPC-shaped requests into [`Repository`] calls
//! and RPC-shaped responses. Both server bindings wrap the same instance:
//! the direct tonic handler returns its [`Response`], while the managed
//! binding copies it into an out-parameter.

use crate::{
    Error, Result,
    proto::{Consignment, GetRequest, Response},
    repository::Repository,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Business logic for creating and listing consignments.
///
/// Holds the repository behind an [`Arc`]; clones share the same store.
pub struct ConsignmentService<R> {
    repo: Arc<R>,
}

impl<R> Clone for ConsignmentService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: Repository> ConsignmentService<R> {
    pub const fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Stores `consignment` and echoes it back with `created = true`.
    ///
    /// `ctx` is the request context. If it is cancelled before the repository
    /// finishes the write, the write is abandoned and nothing is appended.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestCancelled`] if `ctx` was cancelled.
    /// - Any error reported by [`Repository::create`], unchanged.
    pub async fn create_consignment(
        &self,
        ctx: &CancellationToken,
        consignment: Consignment,
    ) -> Result<Response> {
        if ctx.is_cancelled() {
            return Err(Error::RequestCancelled);
        }

        let consignment = ctx
            .run_until_cancelled(self.repo.create(consignment))
            .await
            .ok_or(Error::RequestCancelled)??;

        Ok(Response {
            created: true,
            consignment: Some(consignment),
            ..Default::default()
        })
    }

    /// Returns every stored consignment in insertion order.
    ///
    /// Listing has no failure path; the context is accepted for symmetry with
    /// [`Self::create_consignment`].
    pub async fn get_consignments(&self, _ctx: &CancellationToken, _req: GetRequest) -> Response {
        Response {
            consignments: self.repo.get_all().await,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use futures::future::join_all;
    use core::time::Duration;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Delegates to an in-memory store but rejects writes while `fail` is set.
    #[derive(Default)]
    struct FlakyRepository {
        inner: InMemoryRepository,
        fail: AtomicBool,
    }

    impl Repository for FlakyRepository {
        async fn create(&self, consignment: Consignment) -> Result<Consignment> {
            if self.fail.load(Ordering::Acquire) {
                return Err(Error::Storage {
                    context: "write rejected".to_string(),
                });
            }
            self.inner.create(consignment).await
        }

        async fn get_all(&self) -> Vec<Consignment> {
            self.inner.get_all().await
        }
    }

    /// Holds every write for `delay` before it reaches the store.
    struct SlowRepository {
        inner: InMemoryRepository,
        delay: Duration,
    }

    impl Repository for SlowRepository {
        async fn create(&self, consignment: Consignment) -> Result<Consignment> {
            tokio::time::sleep(self.delay).await;
            self.inner.create(consignment).await
        }

        async fn get_all(&self) -> Vec<Consignment> {
            self.inner.get_all().await
        }
    }

    fn service() -> ConsignmentService<InMemoryRepository> {
        ConsignmentService::new(Arc::new(InMemoryRepository::new()))
    }

    fn consignment(description: &str, weight: i32) -> Consignment {
        Consignment {
            description: description.to_string(),
            weight,
            vessel_id: "vessel001".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_then_list_single_consignment() {
        let service = service();
        let ctx = CancellationToken::new();
        let payload = Consignment {
            weight: 50,
            ..Default::default()
        };

        let created = service.create_consignment(&ctx, payload.clone()).await.unwrap();
        assert!(created.created);
        assert_eq!(created.consignment, Some(payload.clone()));
        assert!(created.consignments.is_empty());

        let listed = service.get_consignments(&ctx, GetRequest {}).await;
        assert!(!listed.created);
        assert_eq!(listed.consignments, vec![payload]);
    }

    #[tokio::test]
    async fn listing_an_empty_store_is_not_an_error() {
        let listed = service()
            .get_consignments(&CancellationToken::new(), GetRequest {})
            .await;
        assert!(listed.consignments.is_empty());
    }

    #[tokio::test]
    async fn sequential_creates_keep_insertion_order() {
        let service = service();
        let ctx = CancellationToken::new();
        let first = consignment("first", 10);
        let second = consignment("second", 20);

        service.create_consignment(&ctx, first.clone()).await.unwrap();
        service.create_consignment(&ctx, second.clone()).await.unwrap();

        let listed = service.get_consignments(&ctx, GetRequest {}).await;
        assert_eq!(listed.consignments, vec![first, second]);
    }

    #[tokio::test]
    async fn repository_error_is_propagated_unchanged() {
        let repo = Arc::new(FlakyRepository::default());
        let service = ConsignmentService::new(Arc::clone(&repo));
        let ctx = CancellationToken::new();

        let kept = consignment("kept", 1);
        service.create_consignment(&ctx, kept.clone()).await.unwrap();

        repo.fail.store(true, Ordering::Release);
        let err = service
            .create_consignment(&ctx, consignment("rejected", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage { ref context } if context == "write rejected"));

        let listed = service.get_consignments(&ctx, GetRequest {}).await;
        assert_eq!(listed.consignments, vec![kept]);
    }

    #[tokio::test]
    async fn cancelled_context_aborts_before_writing() {
        let service = service();
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = service
            .create_consignment(&ctx, consignment("late", 3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestCancelled));
        assert!(service.repository().is_empty());
    }

    #[tokio::test]
    async fn child_context_observes_parent_cancellation() {
        let service = service();
        let shutdown = CancellationToken::new();
        let ctx = shutdown.child_token();
        shutdown.cancel();

        let err = service
            .create_consignment(&ctx, consignment("late", 4))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestCancelled));
    }

    #[tokio::test]
    async fn cancellation_during_pending_write_appends_nothing() {
        let repo = Arc::new(SlowRepository {
            inner: InMemoryRepository::new(),
            delay: Duration::from_millis(200),
        });
        let service = ConsignmentService::new(Arc::clone(&repo));
        let ctx = CancellationToken::new();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = service
            .create_consignment(&ctx, consignment("in flight", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestCancelled));

        // The abandoned write must not land even after its delay elapses.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(repo.inner.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_creates_store_each_payload_once() {
        const CALLS: i32 = 256;
        let service = service();

        let handles = (0..CALLS).map(|weight| {
            let service = service.clone();
            tokio::spawn(async move {
                let ctx = CancellationToken::new();
                service
                    .create_consignment(&ctx, consignment("parallel", weight))
                    .await
            })
        });
        for res in join_all(handles).await {
            assert!(res.unwrap().unwrap().created);
        }

        let listed = service
            .get_consignments(&CancellationToken::new(), GetRequest {})
            .await;
        assert_eq!(listed.consignments.len(), CALLS as usize);
        let weights: HashSet<i32> = listed.consignments.iter().map(|c| c.weight).collect();
        assert_eq!(weights.len(), CALLS as usize);
    }
}
