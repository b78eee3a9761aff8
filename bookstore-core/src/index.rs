// src/index.rs
// Secondary indexes for the in-memory store: key specs, ordered entries, plan selection

use crate::error::{BookstoreError, Result};
use crate::find_options::SortDirection;
use crate::query::{constrained_fields, field_condition, matches_filter};
use crate::value_utils::get_nested_value;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Which fields an index covers, in key order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub keys: Vec<(String, SortDirection)>,
    /// Explicit name; derived from the keys when absent
    pub name: Option<String>,
}

impl IndexSpec {
    /// Ascending index over `fields`, e.g. `["author", "published_year"]`
    pub fn ascending(fields: &[&str]) -> Self {
        Self {
            keys: fields
                .iter()
                .map(|f| (f.to_string(), SortDirection::Ascending))
                .collect(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// MongoDB's default naming: `author_1_published_year_1`
    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.keys
                .iter()
                .map(|(field, dir)| format!("{}_{}", field, dir.as_i32()))
                .collect::<Vec<_>>()
                .join("_")
        })
    }

    /// Key document as sent to `createIndex`, e.g. `{"title": 1}`
    pub fn keys_document(&self) -> Value {
        let map: Map<String, Value> = self
            .keys
            .iter()
            .map(|(field, dir)| (field.clone(), json!(dir.as_i32())))
            .collect();
        Value::Object(map)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|(field, _)| field.as_str())
    }
}

/// Index key - supported types for indexing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKey {
    Null,
    Number(OrderedFloat),
    String(String),
    Bool(bool),
    /// Objects and arrays, keyed by their JSON text
    Other(String),
}

/// OrderedFloat wrapper for f64 to enable Ord
#[derive(Debug, Clone, Copy)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for OrderedFloat {}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<Option<&Value>> for IndexKey {
    fn from(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => IndexKey::Null,
            Some(Value::Number(n)) => IndexKey::Number(OrderedFloat(n.as_f64().unwrap_or(0.0))),
            Some(Value::String(s)) => IndexKey::String(s.clone()),
            Some(Value::Bool(b)) => IndexKey::Bool(*b),
            Some(other) => IndexKey::Other(other.to_string()),
        }
    }
}

impl IndexKey {
    pub fn to_value(&self) -> Value {
        match self {
            IndexKey::Null => Value::Null,
            IndexKey::Number(n) => crate::value_utils::number_value(n.0),
            IndexKey::String(s) => Value::String(s.clone()),
            IndexKey::Bool(b) => Value::Bool(*b),
            IndexKey::Other(text) => serde_json::from_str(text).unwrap_or(Value::Null),
        }
    }
}

/// Result of walking an index for a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexScan {
    pub index_name: String,
    /// Index entries read; one per document id under a matching key
    pub keys_examined: usize,
    /// Document ids whose key prefix satisfied the filter, in key order
    pub doc_ids: Vec<String>,
}

/// One secondary index: compound key → document ids
#[derive(Debug, Clone)]
pub struct SecondaryIndex {
    spec: IndexSpec,
    entries: BTreeMap<Vec<IndexKey>, Vec<String>>,
}

impl SecondaryIndex {
    pub fn new(spec: IndexSpec) -> Self {
        Self {
            spec,
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> String {
        self.spec.name()
    }

    fn key_for(&self, doc: &Value) -> Vec<IndexKey> {
        self.spec
            .fields()
            .map(|field| IndexKey::from(get_nested_value(doc, field)))
            .collect()
    }

    pub fn insert(&mut self, doc_id: &str, doc: &Value) {
        self.entries
            .entry(self.key_for(doc))
            .or_default()
            .push(doc_id.to_string());
    }

    pub fn remove(&mut self, doc_id: &str, doc: &Value) {
        let key = self.key_for(doc);
        if let Some(ids) = self.entries.get_mut(&key) {
            ids.retain(|id| id != doc_id);
            if ids.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many leading key fields the filter constrains
    pub fn usable_prefix(&self, filter: &Value) -> usize {
        let constrained = constrained_fields(filter);
        self.spec
            .fields()
            .take_while(|field| constrained.iter().any(|c| c == field))
            .count()
    }

    /// Walk the entries whose constrained prefix satisfies the filter
    pub fn scan(&self, filter: &Value) -> Result<IndexScan> {
        let prefix = self.usable_prefix(filter);
        if prefix == 0 {
            return Err(BookstoreError::IndexError(format!(
                "Index '{}' cannot serve this filter",
                self.name()
            )));
        }

        let fields: Vec<&str> = self.spec.fields().take(prefix).collect();
        let clauses: Vec<Value> = fields
            .iter()
            .filter_map(|field| field_condition(filter, field))
            .collect();
        let prefix_filter = json!({ "$and": clauses });

        let mut keys_examined = 0;
        let mut doc_ids = Vec::new();
        for (key, ids) in &self.entries {
            let mut key_doc = Map::new();
            for (field, part) in fields.iter().zip(key) {
                key_doc.insert(field.to_string(), part.to_value());
            }
            if matches_filter(&Value::Object(key_doc), &prefix_filter)? {
                keys_examined += ids.len();
                doc_ids.extend(ids.iter().cloned());
            }
        }

        Ok(IndexScan {
            index_name: self.name(),
            keys_examined,
            doc_ids,
        })
    }
}

/// All secondary indexes of one collection
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    indexes: Vec<SecondaryIndex>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index and populate it. Re-creating an identical index is a no-op.
    ///
    /// Returns the index name and whether anything was created.
    pub fn create<'a, I>(&mut self, spec: IndexSpec, docs: I) -> Result<(String, bool)>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        if spec.keys.is_empty() {
            return Err(BookstoreError::IndexError(
                "Index must have at least one key".to_string(),
            ));
        }

        let name = spec.name();
        if let Some(existing) = self.indexes.iter().find(|idx| idx.name() == name) {
            if existing.spec.keys == spec.keys {
                return Ok((name, false));
            }
            return Err(BookstoreError::IndexError(format!(
                "Index already exists with different keys: {}",
                name
            )));
        }
        if self.indexes.iter().any(|idx| idx.spec.keys == spec.keys) {
            return Err(BookstoreError::IndexError(format!(
                "An index with the same keys already exists under another name than '{}'",
                name
            )));
        }

        let mut index = SecondaryIndex::new(spec);
        for (id, doc) in docs {
            index.insert(id, doc);
        }
        self.indexes.push(index);
        Ok((name, true))
    }

    pub fn on_insert(&mut self, doc_id: &str, doc: &Value) {
        for index in &mut self.indexes {
            index.insert(doc_id, doc);
        }
    }

    pub fn on_remove(&mut self, doc_id: &str, doc: &Value) {
        for index in &mut self.indexes {
            index.remove(doc_id, doc);
        }
    }

    pub fn on_update(&mut self, doc_id: &str, before: &Value, after: &Value) {
        self.on_remove(doc_id, before);
        self.on_insert(doc_id, after);
    }

    pub fn names(&self) -> Vec<String> {
        self.indexes.iter().map(SecondaryIndex::name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&SecondaryIndex> {
        self.indexes.iter().find(|idx| idx.name() == name)
    }

    /// Index constraining the longest key prefix; ties go to the older index
    pub fn best_for(&self, filter: &Value) -> Option<&SecondaryIndex> {
        let mut best: Option<(&SecondaryIndex, usize)> = None;
        for index in &self.indexes {
            let prefix = index.usable_prefix(filter);
            if prefix > 0 && best.map_or(true, |(_, p)| prefix > p) {
                best = Some((index, prefix));
            }
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<(String, Value)> {
        vec![
            ("1".into(), json!({"title": "The Hobbit", "author": "J.R.R. Tolkien", "published_year": 1937})),
            ("2".into(), json!({"title": "The Lord of the Rings", "author": "J.R.R. Tolkien", "published_year": 1954})),
            ("3".into(), json!({"title": "1984", "author": "George Orwell", "published_year": 1949})),
            ("4".into(), json!({"title": "Animal Farm", "author": "George Orwell", "published_year": 1945})),
        ]
    }

    fn manager_with(spec: IndexSpec) -> IndexManager {
        let docs = docs();
        let mut manager = IndexManager::new();
        manager
            .create(spec, docs.iter().map(|(id, d)| (id.as_str(), d)))
            .unwrap();
        manager
    }

    #[test]
    fn test_index_names() {
        assert_eq!(IndexSpec::ascending(&["title"]).name(), "title_1");
        assert_eq!(
            IndexSpec::ascending(&["author", "published_year"]).name(),
            "author_1_published_year_1"
        );
        assert_eq!(
            IndexSpec::ascending(&["title"]).with_name("by_title").name(),
            "by_title"
        );
        assert_eq!(
            IndexSpec::ascending(&["author", "published_year"]).keys_document(),
            json!({"author": 1, "published_year": 1})
        );
    }

    #[test]
    fn test_create_twice_is_noop() {
        let docs = docs();
        let mut manager = IndexManager::new();
        let spec = IndexSpec::ascending(&["title"]);

        let (name, created) = manager
            .create(spec.clone(), docs.iter().map(|(id, d)| (id.as_str(), d)))
            .unwrap();
        assert!(created);
        let (again, created_again) = manager
            .create(spec, docs.iter().map(|(id, d)| (id.as_str(), d)))
            .unwrap();
        assert_eq!(name, again);
        assert!(!created_again);
        assert_eq!(manager.names(), vec!["title_1".to_string()]);
        assert_eq!(manager.get("title_1").unwrap().len(), 4);
    }

    #[test]
    fn test_same_name_different_keys_rejected() {
        let mut manager = manager_with(IndexSpec::ascending(&["title"]).with_name("lookup"));
        let err = manager
            .create(IndexSpec::ascending(&["author"]).with_name("lookup"), std::iter::empty())
            .unwrap_err();
        assert!(matches!(err, BookstoreError::IndexError(_)));
    }

    #[test]
    fn test_point_scan_examines_one_key() {
        let manager = manager_with(IndexSpec::ascending(&["title"]));
        let index = manager.best_for(&json!({"title": "The Hobbit"})).unwrap();
        let scan = index.scan(&json!({"title": "The Hobbit"})).unwrap();
        assert_eq!(scan.doc_ids, vec!["1".to_string()]);
        assert_eq!(scan.keys_examined, 1);
        assert_eq!(scan.index_name, "title_1");
    }

    #[test]
    fn test_compound_prefix_scan() {
        let manager = manager_with(IndexSpec::ascending(&["author", "published_year"]));
        let filter = json!({"author": "J.R.R. Tolkien", "published_year": {"$gte": 1950}});
        let index = manager.best_for(&filter).unwrap();
        assert_eq!(index.usable_prefix(&filter), 2);

        let scan = index.scan(&filter).unwrap();
        assert_eq!(scan.doc_ids, vec!["2".to_string()]);
        assert_eq!(scan.keys_examined, 1);

        let scan = index.scan(&json!({"author": "George Orwell"})).unwrap();
        assert_eq!(scan.keys_examined, 2);

        // Leading field unconstrained: index is unusable
        assert!(manager.best_for(&json!({"published_year": 1949})).is_none());
    }

    #[test]
    fn test_maintenance_on_update_and_remove() {
        let docs = docs();
        let mut manager = manager_with(IndexSpec::ascending(&["title"]));
        let before = &docs[0].1;
        let after = json!({"title": "There and Back Again", "author": "J.R.R. Tolkien"});

        manager.on_update("1", before, &after);
        let index = manager.get("title_1").unwrap();
        assert!(index.scan(&json!({"title": "The Hobbit"})).unwrap().doc_ids.is_empty());
        assert_eq!(
            index.scan(&json!({"title": "There and Back Again"})).unwrap().doc_ids,
            vec!["1".to_string()]
        );

        manager.on_remove("1", &after);
        assert_eq!(manager.get("title_1").unwrap().len(), 3);

        for (id, doc) in &docs[1..] {
            manager.on_remove(id, doc);
        }
        assert!(manager.get("title_1").unwrap().is_empty());
    }

    #[test]
    fn test_compound_keys_keep_declared_order() {
        let spec = IndexSpec::ascending(&["title", "author"]);
        let keys: Vec<String> = spec.keys_document().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["title", "author"]);
        assert_eq!(spec.name(), "title_1_author_1");

        let spec = IndexSpec::ascending(&["published_year", "author"]);
        let keys: Vec<String> = spec.keys_document().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["published_year", "author"]);
    }
}
