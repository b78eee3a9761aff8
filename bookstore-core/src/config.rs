// bookstore-core/src/config.rs
// Connection settings: URI from the environment, fixed database/collection names

use crate::error::{BookstoreError, Result};

/// Environment variable holding the MongoDB connection string
pub const URI_ENV_VAR: &str = "MONGODB_URI";

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE: &str = "plp_bookstore";
pub const DEFAULT_COLLECTION: &str = "books";

/// Where the driver connects and which collection it works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

impl StoreConfig {
    /// Build from the process environment, falling back to localhost
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let uri = lookup(URI_ENV_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_URI.to_string());

        Self {
            uri,
            ..Self::default()
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Reject settings the MongoDB client would only fail on later
    pub fn validate(&self) -> Result<()> {
        if !(self.uri.starts_with("mongodb://") || self.uri.starts_with("mongodb+srv://")) {
            return Err(BookstoreError::Config(format!(
                "connection string must start with mongodb:// or mongodb+srv://, got '{}'",
                self.uri
            )));
        }
        if self.database.is_empty() {
            return Err(BookstoreError::Config("database name is empty".to_string()));
        }
        if self.collection.is_empty() {
            return Err(BookstoreError::Config(
                "collection name is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// `database.collection`, for log lines
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = StoreConfig::from_lookup(|_| None);
        assert_eq!(config.uri, "mongodb://localhost:27017");
        assert_eq!(config.database, "plp_bookstore");
        assert_eq!(config.collection, "books");
    }

    #[test]
    fn test_uri_from_env() {
        let config = StoreConfig::from_lookup(|key| {
            (key == "MONGODB_URI").then(|| "mongodb://db.internal:27018".to_string())
        });
        assert_eq!(config.uri, "mongodb://db.internal:27018");
        assert_eq!(config.namespace(), "plp_bookstore.books");
    }

    #[test]
    fn test_blank_env_falls_back() {
        let config = StoreConfig::from_lookup(|_| Some("   ".to_string()));
        assert_eq!(config.uri, DEFAULT_URI);
    }

    #[test]
    fn test_validate() {
        assert!(StoreConfig::default().validate().is_ok());
        assert!(StoreConfig::default()
            .with_uri("mongodb+srv://cluster0.example.net")
            .validate()
            .is_ok());
        assert!(StoreConfig::default()
            .with_uri("http://localhost")
            .validate()
            .is_err());
        assert!(StoreConfig::default()
            .with_collection("")
            .validate()
            .is_err());
    }
}
