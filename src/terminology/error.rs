// SPDX-License-Identifier: GPL-3.0-only
use std::time::Duration;

/// Failure taxonomy for calls against the remote terminology server.
/// Server-supplied reason and message text is preserved verbatim so
/// callers can surface it for diagnosis.
#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
    #[error("remote call failed: {status} - {reason}")]
    CallFailed { status: u16, reason: String },

    #[error("asynchronous submission returned no status location")]
    MissingStatusLocation,

    #[error("remote job failed: {message}")]
    JobFailed { message: String },

    #[error("remote job did not reach a terminal state within {waited:?}")]
    JobTimeout { waited: Duration },

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
