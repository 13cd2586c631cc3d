//! Storage capability for consignments.
//!
//! [`Repository`] is the seam between the service layer and whatever holds
//! the records. [`ConsignmentService`](crate::ConsignmentService) is generic
//! over it, so a persistent backend can replace [`InMemoryRepository`]
//! without touching the service or either transport binding.

use crate::{Result, proto::Consignment};
use core::future::Future;
use parking_lot::Mutex;

/// Create and list operations over an append-only consignment collection.
///
/// Implementations are shared by every in-flight request, hence the
/// `Send + Sync` bound. Methods return futures so slower backends can
/// suspend on I/O.
pub trait Repository: Send + Sync + 'static {
    /// Appends `consignment` and returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`](crate::Error::Storage) if the backend
    /// could not accept the write. A failed create must leave the collection
    /// untouched.
    fn create(&self, consignment: Consignment) -> impl Future<Output = Result<Consignment>> + Send;

    /// Returns a snapshot of every stored consignment in insertion order.
    fn get_all(&self) -> impl Future<Output = Vec<Consignment>> + Send;
}

/// Volatile, process-lifetime store backed by a mutex-guarded `Vec`.
///
/// Appends and snapshots take the same lock, so concurrent writers never
/// race and readers never observe a torn collection.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    consignments: Mutex<Vec<Consignment>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of consignments stored so far.
    pub fn len(&self) -> usize {
        self.consignments.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.consignments.lock().is_empty()
    }
}

impl Repository for InMemoryRepository {
    async fn create(&self, consignment: Consignment) -> Result<Consignment> {
        self.consignments.lock().push(consignment.clone());
        Ok(consignment)
    }

    async fn get_all(&self) -> Vec<Consignment> {
        self.consignments.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::collections::HashSet;
    use std::sync::Arc;

    const WRITERS: usize = 64;

    fn consignment(weight: i32) -> Consignment {
        Consignment {
            description: format!("crate #{weight}"),
            weight,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_repository_lists_nothing() {
        let repo = InMemoryRepository::new();
        assert!(repo.get_all().await.is_empty());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn create_echoes_input_and_preserves_order() {
        let repo = InMemoryRepository::new();
        let first = repo.create(consignment(1)).await.unwrap();
        let second = repo.create(consignment(2)).await.unwrap();

        assert_eq!(first, consignment(1));
        assert_eq!(second, consignment(2));
        assert_eq!(repo.get_all().await, vec![consignment(1), consignment(2)]);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn snapshot_is_not_affected_by_later_writes() {
        let repo = InMemoryRepository::new();
        repo.create(consignment(1)).await.unwrap();
        let snapshot = repo.get_all().await;

        repo.create(consignment(2)).await.unwrap();

        assert_eq!(snapshot, vec![consignment(1)]);
        assert_eq!(repo.get_all().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_creates_are_neither_lost_nor_duplicated() {
        let repo = Arc::new(InMemoryRepository::new());

        let handles = (0..WRITERS as i32).map(|weight| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move { repo.create(consignment(weight)).await })
        });
        for res in join_all(handles).await {
            res.unwrap().unwrap();
        }

        let stored = repo.get_all().await;
        assert_eq!(stored.len(), WRITERS);
        let weights: HashSet<i32> = stored.iter().map(|c| c.weight).collect();
        assert_eq!(weights, (0..WRITERS as i32).collect::<HashSet<_>>());
    }

    #[test]
    fn concurrent_creates_from_os_threads() {
        let repo = Arc::new(InMemoryRepository::new());
        std::thread::scope(|s| {
            for weight in 0..WRITERS as i32 {
                let repo = Arc::clone(&repo);
                s.spawn(move || {
                    futures::executor::block_on(repo.create(consignment(weight))).unwrap();
                });
            }
        });
        assert_eq!(repo.len(), WRITERS);
    }
}
