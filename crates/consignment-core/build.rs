/// Builds the gRPC client and server code for the `consignment.proto`
/// definition using `tonic-prost-build`.
///
/// # Files and Paths
///
/// - Proto file: `proto/consignment.proto`
/// - Includes: `proto/`
/// - Descriptor set: `$OUT_DIR/consignment_descriptor.bin`, consumed by the
///   reflection service.
///
/// # Panics
///
/// This function will `panic!` if code generation fails.
///
/// # Output
///
/// Generated code is accessible in Rust via:
///
/// ```rust,ignore
/// pub mod proto {
///     tonic::include_proto!("consignment");
/// }
/// ```
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("consignment_descriptor.bin");

    println!("cargo:rerun-if-changed=proto/consignment.proto");

    tonic_prost_build::configure()
        .file_descriptor_set_path(&descriptor_path)
        .compile_protos(&["proto/consignment.proto"], &["proto"])
        .unwrap();
}
