//! Source error taxonomy

/// Errors from the reporting / SCIM API that callers need to tell apart
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Credentials were rejected (401 / 403). Never retried.
    #[error("Source rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Any other non-success HTTP status
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The request never produced a response
    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
}

impl SourceError {
    /// Map a `ureq` failure for `endpoint` onto the taxonomy
    pub fn from_ureq(endpoint: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status @ (401 | 403)) => SourceError::Unauthorized { status },
            ureq::Error::StatusCode(status) => SourceError::Status {
                endpoint: endpoint.to_string(),
                status,
            },
            other => SourceError::Transport {
                endpoint: endpoint.to_string(),
                message: other.to_string(),
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SourceError::Unauthorized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = SourceError::from_ureq("reporting/v2/users", ureq::Error::StatusCode(403));
        assert!(err.is_unauthorized());

        let err = SourceError::from_ureq("reporting/v2/users", ureq::Error::StatusCode(503));
        assert_eq!(err.to_string(), "reporting/v2/users returned HTTP 503");
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_transport_mapping() {
        let err = SourceError::from_ureq("scim/v2/Users", ureq::Error::HostNotFound);
        assert!(matches!(err, SourceError::Transport { .. }));
    }
}
