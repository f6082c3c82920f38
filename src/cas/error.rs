//! Error types for CAS validation.

use thiserror::Error;

/// Invalid or missing configuration, at construction or call time.
///
/// Always raised before any network traffic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CAS base URL is required")]
    MissingBaseUrl,

    #[error("CAS base URL is not a valid URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("CAS base URL must use https, got '{0}'")]
    InsecureScheme(String),

    #[error("CAS base URL must have a host, e.g. https://example.com/cas")]
    MissingHost,

    #[error("unsupported CAS protocol version {0}")]
    UnsupportedProtocolVersion(f32),

    #[error("service ticket must not be empty")]
    EmptyTicket,

    #[error("service URL is required when no default service is configured")]
    MissingService,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Anything that prevented a definitive answer from the CAS server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, connect, TLS handshake, read or timeout failure.
    #[error("request to CAS server failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("CAS server returned HTTP {status}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response body ({reason}): {body}")]
    MalformedBody { reason: String, body: String },

    #[error("unrecognized response shape: {body}")]
    UnrecognizedShape { body: String },

    #[error("no username returned despite authentication success")]
    MissingUsername,
}

impl TransportError {
    /// Raw response body, where one was received.
    pub fn body(&self) -> Option<&str> {
        match self {
            TransportError::Status { body, .. }
            | TransportError::MalformedBody { body, .. }
            | TransportError::UnrecognizedShape { body } => Some(body),
            TransportError::Request(_) | TransportError::MissingUsername => None,
        }
    }
}
