// bookstore-core/src/store/memory.rs
// Embedded in-memory collection speaking the same requests as MongoDB
//
// Used by `bookstore run --backend memory` and by the test suite, so the
// walkthrough can run against a seeded dataset without a server.

use std::time::Instant;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BookStore, ExplainStats, UpdateOutcome};
use crate::aggregation::Pipeline;
use crate::error::{BookstoreError, Result};
use crate::find_options::FindOptions;
use crate::index::{IndexManager, IndexSpec};
use crate::query::matches_filter;
use crate::value_utils::{get_nested_value, remove_nested_value, set_nested_value};

#[derive(Debug, Default)]
struct CollectionState {
    /// Documents in insertion order, each carrying an `_id`
    docs: Vec<Value>,
    indexes: IndexManager,
}

/// In-memory document collection
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    state: RwLock<CollectionState>,
}

fn id_key(doc: &Value) -> String {
    match doc.get("_id") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(CollectionState::default()),
        }
    }

    /// Collection pre-loaded with `docs`
    pub fn with_documents(name: impl Into<String>, docs: Vec<Value>) -> Result<Self> {
        let store = Self::new(name);
        store.insert_many(docs)?;
        Ok(store)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index_names(&self) -> Vec<String> {
        self.state.read().indexes.names()
    }

    fn filter_docs(docs: &[Value], filter: &Value) -> Result<Vec<Value>> {
        let mut matched = Vec::new();
        for doc in docs {
            if matches_filter(doc, filter)? {
                matched.push(doc.clone());
            }
        }
        Ok(matched)
    }

    fn position_of_first(docs: &[Value], filter: &Value) -> Result<Option<usize>> {
        for (pos, doc) in docs.iter().enumerate() {
            if matches_filter(doc, filter)? {
                return Ok(Some(pos));
            }
        }
        Ok(None)
    }
}

/// Apply `$set` / `$inc` / `$unset` to a copy of `doc`
fn apply_update_operators(doc: &Value, update: &Value) -> Result<Value> {
    let ops = update
        .as_object()
        .ok_or_else(|| BookstoreError::InvalidUpdate("Update must be an object".to_string()))?;
    if ops.is_empty() || ops.keys().any(|k| !k.starts_with('$')) {
        return Err(BookstoreError::InvalidUpdate(
            "Update document requires atomic operators".to_string(),
        ));
    }

    let mut updated = doc.clone();
    for (op, fields) in ops {
        let fields = fields.as_object().ok_or_else(|| {
            BookstoreError::InvalidUpdate(format!("{} requires an object", op))
        })?;
        for (field, value) in fields {
            if field == "_id" {
                return Err(BookstoreError::InvalidUpdate(
                    "The _id field is immutable".to_string(),
                ));
            }
            match op.as_str() {
                "$set" => set_nested_value(&mut updated, field, value.clone()),
                "$unset" => {
                    remove_nested_value(&mut updated, field);
                }
                "$inc" => {
                    let delta = value.as_f64().ok_or_else(|| {
                        BookstoreError::InvalidUpdate(format!("$inc on '{}' needs a number", field))
                    })?;
                    let next = match get_nested_value(&updated, field) {
                        None => value.clone(),
                        Some(current) if current.is_i64() && value.is_i64() => Value::from(
                            current.as_i64().unwrap_or(0) + value.as_i64().unwrap_or(0),
                        ),
                        Some(current) => {
                            let base = current.as_f64().ok_or_else(|| {
                                BookstoreError::InvalidUpdate(format!(
                                    "Cannot apply $inc to non-numeric field '{}'",
                                    field
                                ))
                            })?;
                            serde_json::Number::from_f64(base + delta)
                                .map(Value::Number)
                                .unwrap_or(Value::Null)
                        }
                    };
                    set_nested_value(&mut updated, field, next);
                }
                other => {
                    return Err(BookstoreError::InvalidUpdate(format!(
                        "Unknown update operator: {}",
                        other
                    )))
                }
            }
        }
    }
    Ok(updated)
}

impl BookStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn find(&self, filter: &Value, options: &FindOptions) -> Result<Vec<Value>> {
        let state = self.state.read();
        let matched = Self::filter_docs(&state.docs, filter)?;
        debug!(collection = %self.name, %filter, matched = matched.len(), "find");
        Ok(options.apply(matched))
    }

    fn find_one(&self, filter: &Value) -> Result<Option<Value>> {
        let state = self.state.read();
        Ok(Self::position_of_first(&state.docs, filter)?.map(|pos| state.docs[pos].clone()))
    }

    fn count_documents(&self, filter: &Value) -> Result<u64> {
        let state = self.state.read();
        Ok(Self::filter_docs(&state.docs, filter)?.len() as u64)
    }

    fn insert_many(&self, docs: Vec<Value>) -> Result<usize> {
        let mut state = self.state.write();
        let mut inserted = 0;
        for mut doc in docs {
            let Value::Object(map) = &mut doc else {
                return Err(BookstoreError::InvalidQuery(
                    "Document must be an object".to_string(),
                ));
            };
            if !map.contains_key("_id") {
                map.insert("_id".to_string(), Value::String(Uuid::new_v4().to_string()));
            }
            let id = id_key(&doc);
            if state.docs.iter().any(|existing| id_key(existing) == id) {
                return Err(BookstoreError::InvalidQuery(format!(
                    "Duplicate _id: {}",
                    id
                )));
            }
            state.indexes.on_insert(&id, &doc);
            state.docs.push(doc);
            inserted += 1;
        }
        debug!(collection = %self.name, inserted, "insert_many");
        Ok(inserted)
    }

    fn update_one(&self, filter: &Value, update: &Value) -> Result<UpdateOutcome> {
        let mut state = self.state.write();
        let Some(pos) = Self::position_of_first(&state.docs, filter)? else {
            return Ok(UpdateOutcome::default());
        };

        let before = state.docs[pos].clone();
        let after = apply_update_operators(&before, update)?;
        if after == before {
            return Ok(UpdateOutcome {
                matched: 1,
                modified: 0,
            });
        }

        state.indexes.on_update(&id_key(&before), &before, &after);
        state.docs[pos] = after;
        Ok(UpdateOutcome {
            matched: 1,
            modified: 1,
        })
    }

    fn delete_one(&self, filter: &Value) -> Result<u64> {
        let mut state = self.state.write();
        match Self::position_of_first(&state.docs, filter)? {
            Some(pos) => {
                let removed = state.docs.remove(pos);
                state.indexes.on_remove(&id_key(&removed), &removed);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_many(&self, filter: &Value) -> Result<u64> {
        let mut state = self.state.write();
        let mut keep = Vec::with_capacity(state.docs.len());
        let mut removed = Vec::new();
        for doc in std::mem::take(&mut state.docs) {
            if matches_filter(&doc, filter)? {
                removed.push(doc);
            } else {
                keep.push(doc);
            }
        }
        for doc in &removed {
            state.indexes.on_remove(&id_key(doc), doc);
        }
        state.docs = keep;
        Ok(removed.len() as u64)
    }

    fn aggregate(&self, pipeline: &[Value]) -> Result<Vec<Value>> {
        let pipeline = Pipeline::from_json(pipeline)?;
        let docs = self.state.read().docs.clone();
        debug!(collection = %self.name, stages = pipeline.len(), "aggregate");
        pipeline.execute(docs)
    }

    fn create_index(&self, spec: &IndexSpec) -> Result<String> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let docs = state.docs.iter().map(|doc| (doc, id_key(doc))).collect::<Vec<_>>();
        let (name, created) = state
            .indexes
            .create(spec.clone(), docs.iter().map(|(doc, id)| (id.as_str(), *doc)))?;
        if created {
            info!(collection = %self.name, index = %name, "index created");
        } else {
            debug!(collection = %self.name, index = %name, "index already exists");
        }
        Ok(name)
    }

    fn explain_find(&self, filter: &Value) -> Result<ExplainStats> {
        let started = Instant::now();
        let state = self.state.read();

        let (keys_examined, docs_examined, docs_returned, index_name) = match state.indexes.best_for(filter) {
            Some(index) => {
                let scan = index.scan(filter)?;
                let mut returned = 0u64;
                for id in &scan.doc_ids {
                    if let Some(doc) = state.docs.iter().find(|d| &id_key(d) == id) {
                        if matches_filter(doc, filter)? {
                            returned += 1;
                        }
                    }
                }
                (
                    scan.keys_examined as u64,
                    scan.doc_ids.len() as u64,
                    returned,
                    Some(scan.index_name),
                )
            }
            None => {
                let returned = Self::filter_docs(&state.docs, filter)?.len() as u64;
                (0, state.docs.len() as u64, returned, None)
            }
        };

        Ok(ExplainStats {
            keys_examined,
            docs_examined,
            docs_returned,
            execution_time_millis: started.elapsed().as_millis() as u64,
            index_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::with_documents(
            "books",
            vec![
                json!({"title": "Dune", "author": "Frank Herbert", "price": 9.99, "stock": 3}),
                json!({"title": "Emma", "author": "Jane Austen", "price": 6.5, "stock": 1}),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_insert_assigns_ids() {
        let store = store();
        let doc = store.find_one(&json!({"title": "Dune"})).unwrap().unwrap();
        assert!(doc["_id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = MemoryStore::new("books");
        store.insert_many(vec![json!({"_id": 1, "title": "A"})]).unwrap();
        assert!(store.insert_many(vec![json!({"_id": 1, "title": "B"})]).is_err());
    }

    #[test]
    fn test_update_operators() {
        let store = store();
        let outcome = store
            .update_one(
                &json!({"title": "Dune"}),
                &json!({"$set": {"price": 11.0}, "$inc": {"stock": 2}, "$unset": {"author": ""}}),
            )
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

        let doc = store.find_one(&json!({"title": "Dune"})).unwrap().unwrap();
        assert_eq!(doc["price"], json!(11.0));
        assert_eq!(doc["stock"], json!(5));
        assert!(doc.get("author").is_none());
    }

    #[test]
    fn test_update_without_change_reports_zero_modified() {
        let store = store();
        let outcome = store
            .update_one(&json!({"title": "Emma"}), &json!({"$set": {"price": 6.5}}))
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 0 });

        let missing = store
            .update_one(&json!({"title": "Ulysses"}), &json!({"$set": {"price": 1.0}}))
            .unwrap();
        assert_eq!(missing, UpdateOutcome::default());
    }

    #[test]
    fn test_update_rejects_replacement_document() {
        let store = store();
        let err = store
            .update_one(&json!({"title": "Emma"}), &json!({"price": 1.0}))
            .unwrap_err();
        assert!(matches!(err, BookstoreError::InvalidUpdate(_)));
    }

    #[test]
    fn test_delete_many() {
        let store = store();
        assert_eq!(store.delete_many(&json!({"price": {"$lt": 100}})).unwrap(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_explain_collection_scan_vs_index() {
        let store = store();
        let filter = json!({"title": "Emma"});

        let scan = store.explain_find(&filter).unwrap();
        assert_eq!(scan.keys_examined, 0);
        assert_eq!(scan.docs_examined, 2);
        assert_eq!(scan.docs_returned, 1);
        assert_eq!(scan.index_name, None);

        store.create_index(&IndexSpec::ascending(&["title"])).unwrap();
        let indexed = store.explain_find(&filter).unwrap();
        assert_eq!(indexed.keys_examined, 1);
        assert_eq!(indexed.docs_examined, 1);
        assert_eq!(indexed.docs_returned, 1);
        assert_eq!(indexed.index_name.as_deref(), Some("title_1"));
    }
}
