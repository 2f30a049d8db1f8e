//! Error types for the healing pipeline.
//!
//! Most failure modes here are recovered in place (schema drift, corrupt
//! files, failed writes, remote billing rejections) and surface as outcome
//! enums rather than errors. An `Err` from this crate means the pipeline
//! could not restore itself to a writable state.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can escape the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error that survived recovery (e.g. the log file could not even
    /// be recreated).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level failure talking to the remote billing API.
    ///
    /// Never surfaced to pipeline callers; the billing gateway downgrades
    /// it to the fallback tier internally.
    #[error("remote billing error: {0}")]
    RemoteBilling(#[from] reqwest::Error),
}
