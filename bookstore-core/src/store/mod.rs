// bookstore-core/src/store/mod.rs
// The seam between the query driver and a document database

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::error::Result;
use crate::find_options::FindOptions;
use crate::index::IndexSpec;
use serde_json::Value;

/// Counts reported by `update_one`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// The execution statistics the driver reports from an explain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplainStats {
    /// Index entries read; 0 for a collection scan
    pub keys_examined: u64,
    pub docs_examined: u64,
    pub docs_returned: u64,
    pub execution_time_millis: u64,
    /// Index that served the query; None for a collection scan
    pub index_name: Option<String>,
}

/// Operations the driver issues against one collection
///
/// Filters, updates and pipelines are JSON in MongoDB syntax. Every call is
/// a blocking request/response; nothing is pipelined.
pub trait BookStore {
    /// Human-readable backend name for log lines
    fn backend(&self) -> &'static str;

    fn find(&self, filter: &Value, options: &FindOptions) -> Result<Vec<Value>>;

    fn find_one(&self, filter: &Value) -> Result<Option<Value>>;

    fn count_documents(&self, filter: &Value) -> Result<u64>;

    fn insert_many(&self, docs: Vec<Value>) -> Result<usize>;

    /// Update the first matching document
    fn update_one(&self, filter: &Value, update: &Value) -> Result<UpdateOutcome>;

    /// Delete the first matching document; returns the deleted count
    fn delete_one(&self, filter: &Value) -> Result<u64>;

    fn delete_many(&self, filter: &Value) -> Result<u64>;

    fn aggregate(&self, pipeline: &[Value]) -> Result<Vec<Value>>;

    /// Create an index; returns its name. Idempotent for identical specs.
    fn create_index(&self, spec: &IndexSpec) -> Result<String>;

    /// Explain a find with execution statistics
    fn explain_find(&self, filter: &Value) -> Result<ExplainStats>;
}
