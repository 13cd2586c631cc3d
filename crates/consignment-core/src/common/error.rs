//! Error types for the consignment service.
//!
//! This module defines the central `Error` enum shared by the repository,
//! the service layer and both transport bindings. It implements
//! `From<Error>` for `tonic::Status` so handlers can propagate failures with
//! `?` and clients receive an appropriate status code.
//!
//! ## Error Cases
//! - `Storage`: The backing store could not accept a write.
//! - `RequestCancelled`: The request context was cancelled before the
//!   operation completed.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the consignment service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The repository failed to persist a consignment.
    #[error("Storage error: {context}")]
    Storage { context: String },

    /// The caller's context was cancelled.
    #[error("Request cancelled")]
    RequestCancelled,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Storage { context } => Status::internal(format!("Storage error: {context}")),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn storage_error_maps_to_internal() {
        let status = Status::from(Error::Storage {
            context: "disk full".to_string(),
        });
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().contains("disk full"));
    }

    #[test]
    fn cancellation_and_shutdown_map_to_distinct_codes() {
        assert_eq!(Status::from(Error::RequestCancelled).code(), Code::Cancelled);
        assert_eq!(Status::from(Error::ServiceShutdown).code(), Code::Unavailable);
    }
}
