//! Error types for highwaysmap.
//!
//! This module defines all error types used throughout the highwaysmap crate,
//! grouped into the three families the web layer reports on: network
//! failures talking to the upstream API, payloads that don't parse, and
//! configuration problems.

use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

/// The main error type for highwaysmap operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Network Errors ===
    /// The upstream API could not be reached.
    #[error("failed to reach closures API at {url}: {source}")]
    Network {
        /// Endpoint that was requested.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The upstream API did not answer in time.
    #[error("closures API at {url} timed out")]
    Timeout {
        /// Endpoint that was requested.
        url: String,
    },

    /// The upstream API answered with a non-success status.
    #[error("closures API returned HTTP {status}: {message}")]
    UpstreamStatus {
        /// HTTP status code returned by the upstream.
        status: u16,
        /// Leading part of the response body, if any.
        message: String,
    },

    // === Parse Errors ===
    /// The payload did not have the expected shape.
    #[error("unexpected closures payload: {message}")]
    Parse {
        /// Description of what was wrong.
        message: String,
    },

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Configuration Errors ===
    /// No subscription key was configured.
    #[error("no National Highways API subscription key provided (set SUBSCRIPTION_KEY)")]
    MissingApiKey,

    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read or write a payload or map file.
    #[error("failed to access {path}: {source}")]
    File {
        /// Path that couldn't be accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for highwaysmap operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a new configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify a transport error from the HTTP client.
    #[must_use]
    pub fn from_transport(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Check if this error came from talking to the upstream API.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Timeout { .. } | Self::UpstreamStatus { .. }
        )
    }

    /// Check if this error is a malformed payload.
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Json(_))
    }

    /// Check if this error is a configuration problem.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey | Self::ConfigLoad(_) | Self::ConfigValidation { .. }
        )
    }

    /// The HTTP status the web layer answers with for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Network { .. }
            | Self::UpstreamStatus { .. }
            | Self::Parse { .. }
            | Self::Json(_) => StatusCode::BAD_GATEWAY,
            Self::MissingApiKey
            | Self::ConfigLoad(_)
            | Self::ConfigValidation { .. }
            | Self::Io(_)
            | Self::File { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::parse("missing D2Payload");
        assert_eq!(
            err.to_string(),
            "unexpected closures payload: missing D2Payload"
        );

        let err = Error::internal("oops");
        assert_eq!(err.to_string(), "internal error: oops");
    }

    #[test]
    fn test_missing_api_key_display() {
        let msg = Error::MissingApiKey.to_string();
        assert!(msg.contains("SUBSCRIPTION_KEY"));
    }

    #[test]
    fn test_upstream_status_display() {
        let err = Error::UpstreamStatus {
            status: 401,
            message: "Access denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("Access denied"));
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout {
            url: "https://example.invalid/closures".to_string(),
        };
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_classification() {
        let status = Error::UpstreamStatus {
            status: 503,
            message: String::new(),
        };
        assert!(status.is_network());
        assert!(!status.is_parse());

        assert!(Error::parse("x").is_parse());
        assert!(!Error::parse("x").is_network());

        assert!(Error::MissingApiKey.is_config());
        assert!(Error::config("bad port").is_config());
        assert!(!Error::MissingApiKey.is_network());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::MissingApiKey.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(Error::parse("x").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            Error::Timeout {
                url: String::new()
            }
            .status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            Error::UpstreamStatus {
                status: 500,
                message: String::new()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
            assert!(err.is_parse());
        }
    }

    #[test]
    fn test_file_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::File {
            path: PathBuf::from("/root/forbidden.json"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden.json"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::config("port must be greater than 0");
        assert!(err.to_string().contains("port must be greater than 0"));
    }
}
