//! Archive codec error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the archive reader and writer.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to open archive {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("archive header truncated or malformed: {0}")]
    BadHeader(String),

    #[error("tile payload of {0} bytes exceeds the 4 GiB entry limit")]
    PayloadTooLarge(u64),

    #[error("failed to write archive: {0}")]
    Write(#[from] std::io::Error),
}
