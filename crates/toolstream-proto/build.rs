// Build script to compile protobuf files into Rust code.
//
// Emits the file descriptor set alongside the generated code so the servers
// can register gRPC reflection without a checked-in descriptor binary.

use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    tonic_build::configure()
        .file_descriptor_set_path(out_dir.join("toolstream_descriptor.bin"))
        .compile(
            &["proto/toolstream.proto", "proto/metastore.proto"],
            &["proto"],
        )?;

    Ok(())
}
