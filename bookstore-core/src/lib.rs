// bookstore-core/src/lib.rs
// Query, update, aggregation and indexing walkthrough over a books collection

pub mod aggregation;
pub mod book;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod error;
pub mod find_options;
pub mod index;
pub mod logging;
pub mod query;
pub mod store;
pub mod value_utils;

// Public exports
pub use book::{sample_catalog, AuthorBookCount, Book, DecadeGroup, GenrePriceSummary};
pub use config::StoreConfig;
pub use driver::QueryDriver;
pub use error::{BookstoreError, Result};
pub use find_options::{FindOptions, SortDirection};
pub use index::IndexSpec;
pub use logging::LogLevel;
pub use store::{BookStore, ExplainStats, MemoryStore, MongoStore, UpdateOutcome};
