//! Error types shared by the transport, wire and loader layers.

use thiserror::Error;

/// Transport-level errors encountered while issuing HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The server returned a non-2xx status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Fully qualified request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The request failed before a response arrived.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Fully qualified request URL.
        url: String,
        /// Description of the failure.
        message: String,
    },
    /// The request exceeded its deadline.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Fully qualified request URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
}

/// A response body did not match the expected wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {what} payload: {message}")]
pub struct WireError {
    /// Which payload failed, e.g. `"source listing"`.
    pub what: &'static str,
    /// Decoder message from `serde_json`.
    pub message: String,
}

impl WireError {
    pub(crate) fn new(what: &'static str, source: &serde_json::Error) -> Self {
        Self {
            what,
            message: source.to_string(),
        }
    }
}

/// Failure loading a single source.
///
/// These never abort the loader queue; they are recorded in the source's
/// status and reported to observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Fetching the source's sites failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The fetched sites could not be decoded.
    #[error(transparent)]
    Wire(#[from] WireError),
}
