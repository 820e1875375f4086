//! Error types for depthgray.

use thiserror::Error;

/// Result type alias using depthgray's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for depth conversion operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The incoming buffer's sample format or layout is not recognized.
    #[error("unsupported depth format: {0}")]
    UnsupportedFormat(String),

    /// Building the output frame pool failed.
    #[error("frame pool allocation failed: {0}")]
    AllocationFailed(String),

    /// No idle output frame available under the retained-count ceiling.
    #[error("frame pool exhausted: all {0} frames in flight")]
    PoolExhausted(usize),

    /// Render was called with a frame that does not match the prepared descriptor.
    #[error("frame shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Render was called before a successful prepare.
    #[error("converter is not prepared")]
    NotPrepared,

    /// The processing worker has shut down.
    #[error("processing worker is gone")]
    WorkerGone,
}
