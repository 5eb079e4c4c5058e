use reqwest::StatusCode;
use thiserror::Error;

/// Failures that can occur while resolving data from an upstream source.
///
/// Only these variants surface as HTTP errors. "No station matched" and
/// "no usable cloud signal" are ordinary outcomes, modelled as `Option`
/// values in [`crate::clouds`], and a fallback-provider failure is absorbed
/// into a null cloud-cover value.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Client-supplied coordinate was absent, non-numeric or non-finite.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The upstream answered with a non-success HTTP status.
    #[error("{provider} request failed with status {status}")]
    UpstreamStatus {
        provider: &'static str,
        status: StatusCode,
    },

    /// The upstream document was structurally unrecognizable.
    #[error("{provider} document unrecognizable: {detail}")]
    Document {
        provider: &'static str,
        detail: String,
    },
}

impl SourceError {
    pub fn document(provider: &'static str, detail: impl Into<String>) -> Self {
        Self::Document {
            provider,
            detail: detail.into(),
        }
    }

    /// True for failures a client can fix by correcting the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidCoordinate(_))
    }
}
