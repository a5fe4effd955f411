//! Error types for the crawler.
//!
//! Split by who has to care:
//!
//! - [`ClientBuildError`]: an HTTP client could not be set up. Fatal, and
//!   raised before any request is made.
//! - [`FetchError`]: the trusted status / stake sources failed. Fatal.
//! - [`ProbeError`]: a single crawled node failed. Always absorbed.
//! - [`ReportError`]: the report could not be rendered or written. Fatal.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a trusted source (`/status` or the `validators` JSON-RPC call).
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, TLS, connect, timeout).
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Endpoint that was being queried.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The endpoint answered with a non-success HTTP status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Endpoint that was being queried.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The body was not the JSON document we expected.
    #[error("malformed response from {url}: {reason}")]
    Malformed {
        /// Endpoint that was being queried.
        url: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The JSON-RPC call returned an `error` object.
    #[error("rpc error {code} from {url}: {message}")]
    Rpc {
        /// Endpoint that was being queried.
        url: String,
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
}

/// The HTTP client could not be built with the requested timeout and
/// user agent.
#[derive(Debug, Error)]
#[error("failed to build HTTP client: {0}")]
pub struct ClientBuildError(#[from] pub reqwest::Error);

/// Failure to probe a single node's `network_info`.
///
/// Never fatal: the crawler logs it and prunes that branch of the graph.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The reported peer address has no usable host part.
    #[error("cannot derive rpc endpoint from address {0:?}")]
    BadAddress(String),

    /// Connection refused, reset, TLS failure, and friends.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered, but not with a success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The node answered with something that is not a network_info document.
    #[error("malformed network_info: {0}")]
    Malformed(String),

    /// The node did not answer within the probe timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ProbeError {
    /// Classifies a client error. reqwest reports its own timeouts as
    /// errors too; those are folded into [`ProbeError::Timeout`] by the caller.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// Whether this failure was a timeout rather than an explicit refusal.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Failure to render or persist the final report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// JSON serialization of the report failed.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The output directory or file could not be written.
    #[error("failed to write report to {path}: {source}")]
    Io {
        /// Path that was being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_messages_name_the_endpoint() {
        let err = FetchError::Status {
            url: "https://rpc.example/status".into(),
            status: 503,
        };
        assert_eq!(err.to_string(), "https://rpc.example/status returned HTTP 503");

        let err = FetchError::Rpc {
            url: "https://rpc.example".into(),
            code: -32000,
            message: "Server error".into(),
        };
        assert!(err.to_string().contains("-32000"));
    }

    #[test]
    fn only_timeouts_report_as_timeouts() {
        assert!(ProbeError::Timeout(Duration::from_secs(5)).is_timeout());
        assert!(!ProbeError::Status(404).is_timeout());
        assert!(!ProbeError::BadAddress("nope".into()).is_timeout());
    }

    #[test]
    fn report_io_error_names_the_path() {
        let err = ReportError::Io {
            path: PathBuf::from("/tmp/out/near.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/out/near.json"));
    }
}
