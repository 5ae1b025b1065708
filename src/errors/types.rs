//! Error type definitions for the MediaWarp gateway
//!
//! The gateway fails open: almost every error defined here ends up logged and
//! turned into a pass-through to the media server. The types exist so callers
//! can decide *how* to degrade, not so errors can reach clients.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Redirect resolution failures
    #[error("Redirect error: {0}")]
    Redirect(#[from] ResolveError),

    /// Response transformation failures
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Media server communication failures
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Cloud storage failures
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures of the bounded redirect-following algorithm
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Seed URL is malformed, relative or has no scheme
    #[error("Invalid URL: {url} - {message}")]
    InvalidUrl { url: String, message: String },

    /// A 3xx response carried no usable Location header
    #[error("Redirect Location header is missing or invalid at {url}")]
    InvalidLocationHeader { url: String },

    /// The chain revisited a URL it had already probed
    #[error("Cyclic redirect detected: {}", .chain.join(" -> "))]
    CyclicRedirect { chain: Vec<String> },

    /// Too many hops without reaching a terminal response
    #[error("Exceeded maximum redirect attempts ({max})")]
    MaxRedirectsExceeded { max: usize },

    /// The overall resolution budget ran out
    #[error("Redirect resolution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u128 },

    /// Transport failure while probing a hop
    #[error("Probe request to {url} failed: {message}")]
    Probe { url: String, message: String },
}

/// Response transformation failures.
///
/// Any of these means "forward the original response unmodified".
#[derive(Error, Debug)]
pub enum TransformError {
    /// Body could not be decoded into the expected shape
    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Mutated document could not be encoded again
    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Malformed URL found inside the document
    #[error("Invalid URL: {url} - {message}")]
    InvalidUrl { url: String, message: String },

    /// Body was not valid text where text was required
    #[error("Body is not valid UTF-8")]
    NotUtf8,

    /// A field needed to rebuild a URL was absent
    #[error("Missing field {field} on {what}")]
    MissingField {
        field: &'static str,
        what: &'static str,
    },
}

/// Media server communication failures
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Non-success HTTP status
    #[error("HTTP error: {status} from {url}")]
    Status { status: u16, url: String },

    /// Response body did not match the expected schema
    #[error("Unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    /// The requested item does not exist
    #[error("Item not found: {id}")]
    ItemNotFound { id: String },
}

/// Cloud storage (Alist) failures
#[derive(Error, Debug)]
pub enum StorageError {
    /// No storage endpoint configured under this address
    #[error("Unknown storage endpoint: {endpoint}")]
    UnknownEndpoint { endpoint: String },

    /// Transport-level failure
    #[error("Storage request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Storage API answered with an error code
    #[error("Storage API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Authentication could not be established
    #[error("Storage authentication failed: {message}")]
    Authentication { message: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl ResolveError {
    pub fn invalid_url<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from the redirect safety checks rather than
    /// from input validation or transport
    pub fn is_safety_violation(&self) -> bool {
        matches!(
            self,
            Self::CyclicRedirect { .. }
                | Self::MaxRedirectsExceeded { .. }
                | Self::InvalidLocationHeader { .. }
                | Self::Timeout { .. }
        )
    }
}

impl TransformError {
    pub fn invalid_url<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}

impl UpstreamError {
    pub fn request<U: Into<String>>(url: U, err: &reqwest::Error) -> Self {
        Self::Request {
            url: url.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_redirect_message_contains_chain() {
        let err = ResolveError::CyclicRedirect {
            chain: vec![
                "http://a/".to_string(),
                "http://b/".to_string(),
                "http://a/".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Cyclic redirect detected: http://a/ -> http://b/ -> http://a/"
        );
        assert!(err.is_safety_violation());
    }

    #[test]
    fn test_invalid_url_is_not_safety_violation() {
        let err = ResolveError::invalid_url("foo", "relative URL without a base");
        assert!(!err.is_safety_violation());
    }

    #[test]
    fn test_app_error_wraps_resolve_error() {
        let err: AppError = ResolveError::MaxRedirectsExceeded { max: 10 }.into();
        assert!(matches!(err, AppError::Redirect(_)));
        assert!(err.to_string().contains("(10)"));
    }
}
