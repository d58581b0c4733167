//! Build script for proto compilation.
//!
//! Compiles `proto/provider.proto` into the server-side gRPC types included
//! by `crate::proto`. A vendored `protoc` is used unless `PROTOC` is already
//! set, so the build does not depend on a system install.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path().map_err(|e| e.to_string())?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_prost_build::configure()
        .build_client(false)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/provider.proto");

    Ok(())
}
