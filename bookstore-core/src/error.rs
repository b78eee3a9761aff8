// bookstore-core/src/error.rs
// Error taxonomy for store backends and the query driver

use thiserror::Error;

/// Errors surfaced by the bookstore backends and the driver
#[derive(Debug, Error)]
pub enum BookstoreError {
    /// Failure reported by the MongoDB client (connection, command, timeout)
    ///
    /// The client error is rendered inline and not chained as a source, so
    /// `{:#}` reports print it once.
    #[error("Database error: {0}")]
    Database(Box<mongodb::error::Error>),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Aggregation error: {0}")]
    AggregationError(String),

    #[error("Index error: {0}")]
    IndexError(String),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// JSON value could not be represented as BSON
    #[error("BSON conversion error: {0}")]
    Bson(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<mongodb::error::Error> for BookstoreError {
    fn from(err: mongodb::error::Error) -> Self {
        BookstoreError::Database(Box::new(err))
    }
}

impl From<mongodb::bson::ser::Error> for BookstoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        BookstoreError::Bson(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BookstoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BookstoreError::InvalidQuery("Unknown operator: $foo".to_string());
        assert_eq!(err.to_string(), "Invalid query: Unknown operator: $foo");

        let err = BookstoreError::DocumentNotFound("The Great Gatsby".to_string());
        assert_eq!(err.to_string(), "Document not found: The Great Gatsby");
    }

    #[test]
    fn test_json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: BookstoreError = json_err.into();
        assert!(matches!(err, BookstoreError::Serialization(_)));
    }

    #[test]
    fn test_database_error_rendered_once() {
        let Err(client_err) = mongodb::sync::Client::with_uri_str("mongodb://localhost:notaport")
        else {
            panic!("invalid port should not parse");
        };
        let detail = client_err.to_string();
        let err: BookstoreError = client_err.into();

        assert!(std::error::Error::source(&err).is_none());
        assert_eq!(err.to_string(), format!("Database error: {}", detail));
    }
}
