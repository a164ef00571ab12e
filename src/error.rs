use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Store session could not be established, failed its ping, or is missing
    #[error("Connection Error: {0}")]
    Connection(String),
    /// Resolved database/collection pair is not enumerable in the store
    #[error("Invalid database or collection: {database}.{collection}")]
    InvalidTarget { database: String, collection: String },
    /// Non-success HTTP status on a content fetch
    #[error("Fetch Error: received status code {status} for {url}")]
    Fetch { status: u16, url: String },
    /// Document store driver error
    #[error("Store Error: {0}")]
    Store(String),
    /// External service (HTTP transport) error
    #[error("External Service Error: {0}")]
    ExternalService(String),
    /// Validation error
    #[error("Validation Error: {0}")]
    Validation(String),
    /// Internal error
    #[error("Internal Error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalService(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Validation(format!("Invalid URL: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_target_names_the_pair() {
        let err = AppError::InvalidTarget {
            database: "aquaria".to_string(),
            collection: "missing".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid database or collection: aquaria.missing");
    }

    #[test]
    fn fetch_error_carries_status() {
        let err = AppError::Fetch { status: 404, url: "https://example.com/x".to_string() };
        assert!(err.to_string().contains("404"));
    }
}
