//! Shared protocol types and the service error type.
//!
//! - [`error`] - Central error enum and its mapping onto gRPC status codes.
//! - [`proto`] - Generated messages, server/client stubs and the descriptor
//!   set for reflection.

pub mod error;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/consignment.proto`.
///
/// ## Service
///
/// - `ShippingService.CreateConsignment` - stores a [`Consignment`] and echoes
///   it back in a [`Response`] with `created = true`.
/// - `ShippingService.GetConsignments` - returns every stored consignment in
///   insertion order.
///
/// [`Consignment`]: proto::Consignment
/// [`Response`]: proto::Response
pub mod proto {
    tonic::include_proto!("consignment");

    /// Encoded `FileDescriptorSet` for `consignment.proto`, registered with
    /// the reflection service so generic tooling can discover the API.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("consignment_descriptor");
}
