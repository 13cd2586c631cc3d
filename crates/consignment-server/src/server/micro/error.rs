use super::registry::RegistryError;

pub type Result<T> = core::result::Result<T, MicroError>;

/// Failures raised while starting, registering or running a managed service.
#[derive(thiserror::Error, Debug)]
pub enum MicroError {
    /// The listener could not be bound or inspected.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// No handler was registered before `run`.
    #[error("service {0} has no registered handlers")]
    NoHandlers(String),

    /// The discovery registry rejected the operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The tonic serve loop failed.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}
