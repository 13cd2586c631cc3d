//! Server-side components of the consignment service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration for both binaries.
//! - [`service`] - Direct binding: tonic handler and server assembly.
//! - [`micro`] - Managed-service framework (naming, discovery registry,
//!   out-parameter handlers).
//! - [`managed`] - Managed binding of the consignment service.
//! - [`shutdown`] - Ctrl+C/SIGTERM handling.
//! - [`telemetry`] - Logging and optional OpenTelemetry export.

pub mod config;
pub mod managed;
pub mod micro;
pub mod service;
pub mod shutdown;
pub mod telemetry;
