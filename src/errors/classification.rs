use super::types::SiftError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl SiftError {
    /// Classify this error to determine its type and whether it can be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            SiftError::RateLimit(_) => ErrorClassification {
                error_type: "RateLimitError",
                retryable: true,
            },
            SiftError::TransientUpstream(_) => ErrorClassification {
                error_type: "TransientUpstreamError",
                retryable: true,
            },
            SiftError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            SiftError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },

            // Non-retryable errors
            SiftError::PermanentUpstream(_) => ErrorClassification {
                error_type: "PermanentUpstreamError",
                retryable: false,
            },
            SiftError::Authentication(_) => ErrorClassification {
                error_type: "AuthenticationError",
                retryable: false,
            },
            SiftError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            SiftError::Validation(_) => ErrorClassification {
                error_type: "ValidationError",
                retryable: false,
            },
            SiftError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },

            // The upsert engine handles database failures with its own
            // tiered fallback, never the generic retry loop.
            SiftError::Database(_) => ErrorClassification {
                error_type: "DatabaseError",
                retryable: false,
            },

            SiftError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            SiftError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::validation::ValidationError;

    #[test]
    fn test_rate_limit_is_retryable() {
        let err = SiftError::RateLimit("too many requests".into());
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "RateLimitError");
    }

    #[test]
    fn test_transient_upstream_retryable() {
        let err = SiftError::TransientUpstream("502 bad gateway".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn test_permanent_upstream_not_retryable() {
        let err = SiftError::PermanentUpstream("404 not found".into());
        let class = err.classify();
        assert!(!class.retryable);
        assert_eq!(class.error_type, "PermanentUpstreamError");
    }

    #[test]
    fn test_auth_error_not_retryable() {
        let err = SiftError::Authentication("bad token".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_config_error_not_retryable() {
        let err = SiftError::Config("missing SIFT_API_TOKEN".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_validation_error_not_retryable() {
        let err = SiftError::Validation(ValidationError::new("sha256", "invalid hex"));
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_network_error_retryable() {
        let err = SiftError::Network("connection refused".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn test_database_not_retryable_by_generic_loop() {
        let err = SiftError::Database("constraint failed".into());
        assert!(!err.classify().retryable);
    }
}
