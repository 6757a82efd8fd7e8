use thiserror::Error;

/// Failure reason reported by a provider adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("No results: {0}")]
    NoResults(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request cancelled")]
    Cancelled,
}

/// Outcome of a single provider call
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings() {
        let err = ProviderError::Status {
            status: 503,
            message: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: busy");
        assert_eq!(
            ProviderError::NoResults("地址未找到".to_string()).to_string(),
            "No results: 地址未找到"
        );
        assert_eq!(ProviderError::Cancelled.to_string(), "Request cancelled");
    }
}
