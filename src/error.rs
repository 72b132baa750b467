//! Error taxonomy for the pipeline.
//!
//! Each boundary has its own error type so the cycle controller can apply
//! the right policy per step: adapter and publish errors are caught and
//! converted to "no result" at their boundary, a transform error downgrades
//! to a warning, a fetch error ends the cycle without mutating state, and
//! only a state I/O error on the read-before-decide path aborts the run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A single source adapter failed. Never fatal: the selector logs it and
/// moves on to the next adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("source configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source API error: {0}")]
    Api(String),

    #[error("malformed source response: {0}")]
    Decode(String),

    #[error(transparent)]
    State(#[from] StateIoError),
}

/// The download step failed for this cycle's candidate. Fatal to the cycle,
/// but the candidate id is deliberately not recorded so the next run retries.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to launch downloader: {0}")]
    Launch(#[source] std::io::Error),

    #[error("download failed: {0}")]
    Failed(String),

    #[error("downloader reported success but no output file exists for {0}")]
    MissingOutput(String),

    #[error("download timed out after {0:?}")]
    Timeout(Duration),
}

/// The vertical reformat failed. Non-fatal: publishing proceeds with the
/// original file.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to launch transformer: {0}")]
    Launch(#[source] std::io::Error),

    #[error("transform failed: {0}")]
    Failed(String),

    #[error("transform timed out after {0:?}")]
    Timeout(Duration),
}

/// One publish destination failed. Destinations are independent, so these
/// are aggregated via OR and never short-circuit each other.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("missing or invalid credentials: {0}")]
    Credentials(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("destination API error: {0}")]
    Api(String),

    #[error("remote processing failed: {0}")]
    RemoteProcessing(String),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("local file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reading or writing the processed-id list or daily counter failed.
/// Treated as fatal: continuing would risk publishing a duplicate.
#[derive(Debug, Error)]
pub enum StateIoError {
    #[error("state I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state file {path}: {detail}")]
    Corrupt { path: PathBuf, detail: String },
}
