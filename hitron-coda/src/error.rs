//! Error types for the device client.

use thiserror::Error;

/// Result type alias using [`DeviceError`].
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors that can occur while talking to the modem.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The configured host cannot be turned into a base URL.
    #[error("Invalid device host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },

    /// HTTP transport failure (connect, TLS, body read).
    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request did not complete within the client timeout.
    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    /// Non-success HTTP status.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The device answered but reported an API error code.
    #[error("{endpoint} reported error {code}: {message}")]
    Api {
        endpoint: String,
        code: String,
        message: String,
    },

    /// The modem rejected the credentials.
    #[error("Login rejected: {0}")]
    LoginFailed(String),

    /// The response body could not be decoded into a record.
    #[error("Failed to decode {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    /// The scrape that owned this call went away.
    #[error("Scrape cancelled")]
    Cancelled,
}

impl DeviceError {
    /// Create a decode error.
    pub fn decode(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Classify a reqwest error raised while calling `endpoint`.
    pub(crate) fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else if let Some(status) = err.status() {
            Self::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            Self::decode(endpoint, err.to_string())
        } else {
            Self::Transport {
                endpoint: endpoint.to_string(),
                source: err,
            }
        }
    }
}
