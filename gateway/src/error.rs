//! Error types for the viesti gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Outbound HTTP client error
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = GatewayError::Config("VIESTI_WORKERS must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: VIESTI_WORKERS must be at least 1"
        );
    }

    #[test]
    fn test_metrics_error_display() {
        let err = GatewayError::Metrics("duplicate collector".to_string());
        assert_eq!(err.to_string(), "metrics error: duplicate collector");
    }
}
