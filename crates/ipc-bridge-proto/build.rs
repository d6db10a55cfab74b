//! Computes the schema digest at build time.
//!
//! The digest identifies a specific build of the message schema: the set of
//! wire types defined in `src/envelope.rs`, `src/control.rs`, and
//! `src/payloads/`. It is a SHA-256 over the sorted list of descriptor names
//! below plus a format-version tag, not a hash of file contents, so
//! reordering fields within a type does not change the digest but adding or
//! removing a descriptor does.

use std::{env, fmt::Write as _, fs, path::Path};

use sha2::{Digest, Sha256};

/// Canonical descriptor set, one entry per wire type. Keep sorted.
const DESCRIPTORS: &[&str] = &[
    "control.hello",
    "control.reject",
    "control.welcome",
    "envelope.event",
    "envelope.request",
    "envelope.response",
    "payload.diagnostics.snapshot",
    "payload.health.check",
];

const FORMAT_VERSION: &str = "ipc-bridge-schema-v1";

#[allow(clippy::expect_used)]
fn main() {
    let mut hasher = Sha256::new();
    hasher.update(FORMAT_VERSION.as_bytes());
    for descriptor in DESCRIPTORS {
        hasher.update(b"\0");
        hasher.update(descriptor.as_bytes());
    }
    let digest = hasher.finalize();

    let mut bytes_literal = String::from("[");
    for (i, byte) in digest.iter().enumerate() {
        if i > 0 {
            bytes_literal.push_str(", ");
        }
        let _ = write!(bytes_literal, "0x{byte:02x}");
    }
    bytes_literal.push(']');

    let out_dir = env::var("OUT_DIR").expect("invariant: cargo always sets OUT_DIR for build.rs");
    let dest = Path::new(&out_dir).join("schema_digest.rs");
    fs::write(
        &dest,
        format!("/// Compile-time schema digest, see `build.rs`.\npub const SCHEMA_DIGEST: [u8; 32] = {bytes_literal};\n"),
    )
    .expect("invariant: OUT_DIR is writable during build");

    println!("cargo:rerun-if-changed=build.rs");
}
