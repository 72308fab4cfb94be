#![forbid(unsafe_code)]
//! Shared plumbing for the ufsview command-line tools.

use anyhow::{Context, Result};
use std::path::Path;

/// Install a stderr `fmt` subscriber honoring `RUST_LOG`.
///
/// Diagnostics must stay off stdout: `ufs-cat` writes raw file bytes there.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Read the full partition image into memory.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read image: {}", path.display()))
}
