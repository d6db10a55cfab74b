//! Workspace root package.
//!
//! This crate carries only workspace-wide metadata and dev-tooling hooks
//! (see `Cargo.toml`); the actual implementation lives in `crates/`.
