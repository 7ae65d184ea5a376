//! Engine-wide error type.

use std::path::PathBuf;

use thiserror::Error;

/// Which file operation an I/O error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoStage {
    Open,
    Read,
    Write,
    Close,
}

impl std::fmt::Display for IoStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IoStage::Open => "open",
            IoStage::Read => "read",
            IoStage::Write => "write",
            IoStage::Close => "close",
        };
        f.write_str(s)
    }
}

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The PLY header could not be parsed at all.
    #[error("invalid PLY header in {path}: {reason}")]
    HeaderInvalid { path: PathBuf, reason: String },

    /// The PLY header parsed but describes a layout we do not read.
    #[error("unsupported PLY layout in {path}: {reason}")]
    FormatUnsupported { path: PathBuf, reason: String },

    /// Fewer bytes than requested came back from a read.
    #[error("short read from {path}: expected {expected} bytes, got {got}")]
    ShortRead {
        path: PathBuf,
        expected: u64,
        got: u64,
    },

    /// Failed file operation, tagged with the stage it failed at.
    #[error("failed to {stage} {path}: {source}")]
    Io {
        stage: IoStage,
        path: PathBuf,
        source: std::io::Error,
    },

    /// The queue was stopped; signals shutdown, not a failure.
    #[error("queue stopped")]
    QueueStopped,

    /// A setup step failed; the process exits with code 1.
    #[error("initialization failed: {0}")]
    InitFailed(String),

    /// The ingest manifest could not be read or did not match the source.
    #[error("manifest error: {0}")]
    Manifest(String),
}

impl EngineError {
    /// Tag an `io::Error` with the stage and path it occurred at.
    pub fn io(stage: IoStage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            stage,
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, EngineError>;
