//! Error types for lensgate

use reqwest::StatusCode;

/// Result type alias for lensgate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the caller of a gateway or aggregator operation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required identifier was blank
    #[error("'{0}' parameter is required")]
    EmptyParameter(&'static str),

    /// The upstream provider could not serve the request
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A spawned fetch task panicked or was cancelled
    #[error("fetch task did not complete")]
    TaskAborted,
}

impl Error {
    /// True when the failure is the requester's fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::EmptyParameter(_))
    }

    /// HTTP-style status a request layer should answer with
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

/// Failures talking to the upstream provider
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Unreachable, timed out, or the body could not be read
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        /// Upstream endpoint name
        endpoint: &'static str,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Response was not JSON
    #[error("{endpoint} returned non-JSON response (content type '{content_type}')")]
    NotJson {
        /// Upstream endpoint name
        endpoint: &'static str,
        /// Content type the provider sent
        content_type: String,
    },

    /// JSON response with a non-success status
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Upstream endpoint name
        endpoint: &'static str,
        /// Status the provider sent
        status: StatusCode,
    },

    /// JSON envelope did not match the expected shape
    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        /// Upstream endpoint name
        endpoint: &'static str,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// Envelope decoded but reported failure
    #[error("{endpoint} rejected the request: {message}")]
    Rejected {
        /// Upstream endpoint name
        endpoint: &'static str,
        /// Provider's reason
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let client = Error::EmptyParameter("steamID");
        assert!(client.is_client_error());
        assert_eq!(client.status_code(), 400);
        assert_eq!(client.to_string(), "'steamID' parameter is required");

        let server = Error::from(UpstreamError::NotJson {
            endpoint: "GetOwnedGames",
            content_type: "text/html".to_string(),
        });
        assert!(!server.is_client_error());
        assert_eq!(server.status_code(), 500);
        assert!(server.to_string().contains("non-JSON"));
    }
}
