//! A small managed-service framework.
//!
//! Instead of binding a socket itself, application code describes a service
//! by logical name and version, registers handlers on the framework's
//! server, and lets [`MicroService::run`] pick the listener, publish the
//! service to a discovery [`Registry`](registry::Registry), serve health
//! checks and deregister on shutdown.
//!
//! - [`registry`] - Discovery records and the in-memory registry.
//! - [`shipping`] - Out-parameter handler convention for `ShippingService`
//!   and its registration function.

mod error;
pub mod registry;
mod service;
pub mod shipping;

pub use error::{MicroError, Result};
pub use service::{DEFAULT_ADDRESS, MicroServer, MicroService, Options};
