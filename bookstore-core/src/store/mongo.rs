// bookstore-core/src/store/mongo.rs
// MongoDB backend over the official driver's blocking API

use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::IndexOptions;
use mongodb::sync::{Client, Collection, Database};
use mongodb::IndexModel;
use serde_json::Value;
use tracing::{debug, info};

use super::{BookStore, ExplainStats, UpdateOutcome};
use crate::config::StoreConfig;
use crate::error::{BookstoreError, Result};
use crate::find_options::FindOptions;
use crate::index::IndexSpec;

/// One open connection to `database.collection`
///
/// The client is released when the store is dropped.
pub struct MongoStore {
    namespace: String,
    database: Database,
    collection: Collection<Document>,
    // Held for the lifetime of the store; dropping it closes the pool
    _client: Client,
}

impl MongoStore {
    /// Connect and ping, so an unreachable server fails here rather than mid-walkthrough
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::with_uri_str(&config.uri)?;
        let database = client.database(&config.database);
        database.run_command(doc! { "ping": 1 }).run()?;
        info!(namespace = %config.namespace(), "connected to MongoDB");

        let collection = database.collection::<Document>(&config.collection);
        Ok(Self {
            namespace: config.namespace(),
            database,
            collection,
            _client: client,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Drop for MongoStore {
    fn drop(&mut self) {
        debug!(namespace = %self.namespace, "closing MongoDB connection");
    }
}

/// JSON object → BSON document
fn to_document(value: &Value) -> Result<Document> {
    if !value.is_object() {
        return Err(BookstoreError::InvalidQuery(format!(
            "expected a JSON object, got {}",
            value
        )));
    }
    Ok(bson::to_document(value)?)
}

/// BSON document → relaxed extended JSON
fn to_json(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}

fn collect_cursor<I>(cursor: I) -> Result<Vec<Value>>
where
    I: Iterator<Item = mongodb::error::Result<Document>>,
{
    let mut docs = Vec::new();
    for doc in cursor {
        docs.push(to_json(doc?));
    }
    Ok(docs)
}

fn bson_to_u64(value: Option<&Bson>) -> u64 {
    match value {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(f)) if *f >= 0.0 => *f as u64,
        _ => 0,
    }
}

/// First `indexName` anywhere in the winning plan tree
fn find_index_name(plan: &Document) -> Option<String> {
    if let Ok(name) = plan.get_str("indexName") {
        return Some(name.to_string());
    }
    plan.values().find_map(|value| match value {
        Bson::Document(inner) => find_index_name(inner),
        Bson::Array(items) => items.iter().find_map(|item| match item {
            Bson::Document(inner) => find_index_name(inner),
            _ => None,
        }),
        _ => None,
    })
}

fn explain_stats(reply: &Document) -> Result<ExplainStats> {
    let stats = reply.get_document("executionStats").map_err(|e| {
        BookstoreError::InvalidQuery(format!("explain reply has no executionStats: {}", e))
    })?;

    let index_name = reply
        .get_document("queryPlanner")
        .and_then(|planner| planner.get_document("winningPlan"))
        .ok()
        .and_then(find_index_name);

    Ok(ExplainStats {
        keys_examined: bson_to_u64(stats.get("totalKeysExamined")),
        docs_examined: bson_to_u64(stats.get("totalDocsExamined")),
        docs_returned: bson_to_u64(stats.get("nReturned")),
        execution_time_millis: bson_to_u64(stats.get("executionTimeMillis")),
        index_name,
    })
}

impl BookStore for MongoStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    fn find(&self, filter: &Value, options: &FindOptions) -> Result<Vec<Value>> {
        debug!(namespace = %self.namespace, %filter, "find");
        let mut action = self.collection.find(to_document(filter)?);
        if let Some(sort) = options.sort_document() {
            action = action.sort(to_document(&sort)?);
        }
        if let Some(projection) = options.projection_document() {
            action = action.projection(to_document(&projection)?);
        }
        if let Some(skip) = options.skip {
            action = action.skip(skip as u64);
        }
        if let Some(limit) = options.limit {
            action = action.limit(limit as i64);
        }
        collect_cursor(action.run()?)
    }

    fn find_one(&self, filter: &Value) -> Result<Option<Value>> {
        debug!(namespace = %self.namespace, %filter, "find_one");
        Ok(self
            .collection
            .find_one(to_document(filter)?)
            .run()?
            .map(to_json))
    }

    fn count_documents(&self, filter: &Value) -> Result<u64> {
        Ok(self.collection.count_documents(to_document(filter)?).run()?)
    }

    fn insert_many(&self, docs: Vec<Value>) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let docs = docs
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>>>()?;
        let result = self.collection.insert_many(docs).run()?;
        debug!(namespace = %self.namespace, inserted = result.inserted_ids.len(), "insert_many");
        Ok(result.inserted_ids.len())
    }

    fn update_one(&self, filter: &Value, update: &Value) -> Result<UpdateOutcome> {
        debug!(namespace = %self.namespace, %filter, %update, "update_one");
        let result = self
            .collection
            .update_one(to_document(filter)?, to_document(update)?)
            .run()?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    fn delete_one(&self, filter: &Value) -> Result<u64> {
        debug!(namespace = %self.namespace, %filter, "delete_one");
        Ok(self
            .collection
            .delete_one(to_document(filter)?)
            .run()?
            .deleted_count)
    }

    fn delete_many(&self, filter: &Value) -> Result<u64> {
        debug!(namespace = %self.namespace, %filter, "delete_many");
        Ok(self
            .collection
            .delete_many(to_document(filter)?)
            .run()?
            .deleted_count)
    }

    fn aggregate(&self, pipeline: &[Value]) -> Result<Vec<Value>> {
        debug!(namespace = %self.namespace, stages = pipeline.len(), "aggregate");
        let stages = pipeline
            .iter()
            .map(to_document)
            .collect::<Result<Vec<_>>>()?;
        collect_cursor(self.collection.aggregate(stages).run()?)
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<String> {
        let model = IndexModel::builder()
            .keys(to_document(&spec.keys_document())?)
            .options(IndexOptions::builder().name(spec.name()).build())
            .build();
        let result = self.collection.create_index(model).run()?;
        info!(namespace = %self.namespace, index = %result.index_name, "index created");
        Ok(result.index_name)
    }

    fn explain_find(&self, filter: &Value) -> Result<ExplainStats> {
        let command = doc! {
            "explain": {
                "find": self.collection.name(),
                "filter": to_document(filter)?,
            },
            "verbosity": "executionStats",
        };
        let reply = self.database.run_command(command).run()?;
        explain_stats(&reply)
    }
}
