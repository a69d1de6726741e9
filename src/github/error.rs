//! Error type for the GitHub releases client.

use thiserror::Error;

/// Failures talking to the release feed or downloading an asset.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The repository does not exist or has no published release.
    #[error("no release found for {0}")]
    NotFound(String),

    /// GitHub refused the request because of rate limiting (HTTP 403/429).
    #[error("rate limited by GitHub (status {status})")]
    RateLimited { status: u16 },

    /// Any other non-success response.
    #[error("GitHub API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("failed to write asset: {0}")]
    Io(#[from] std::io::Error),
}
