// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::path::PathBuf;

use crate::software::DecodeError;
use crate::text::RenderError;

/// Errors surfaced by the texture manager.
///
/// Device faults are deliberately absent: a lost context or driver failure is
/// outside this crate's control and is only logged by the backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A CPU pixel buffer could not be allocated.
    #[error("out of memory for {width}x{height} pixel buffer")]
    OutOfMemory { width: u32, height: u32 },
    /// A source image is missing or corrupt.
    ///
    /// The cache recovers from this with a placeholder; direct constructors propagate it.
    #[error("cannot decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    /// Text could not be rasterized.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Export to disk failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
