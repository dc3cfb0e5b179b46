//! Error types for Parley gateway

use thiserror::Error;

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Parley gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credential, invalid setting)
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-success response from an external API
    #[error("{service} error {status}: {body}")]
    Upstream {
        /// Service that produced the response
        service: &'static str,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Success response with an unexpected shape
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Call handler failed after a call was requested
    #[error("call request error: {0}")]
    CallRequest(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Build an upstream error from a failed response, consuming its body
    pub(crate) async fn upstream(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Upstream {
            service,
            status,
            body,
        }
    }

    /// HTTP status code carried by this error, if any
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_carries_status_and_body() {
        let err = Error::Upstream {
            service: "anthropic",
            status: 529,
            body: "{\"error\":\"overloaded\"}".to_string(),
        };
        assert_eq!(err.to_string(), "anthropic error 529: {\"error\":\"overloaded\"}");
        assert_eq!(err.status(), Some(529));
    }

    #[test]
    fn test_status_absent_for_other_errors() {
        assert_eq!(Error::Config("missing".to_string()).status(), None);
    }
}
