// bookstore-core/src/find_options.rs
// Find query options: projection, sort, limit, skip

use crate::value_utils::{get_nested_value, sort_order};
use serde_json::{json, Map, Value};

/// Sort direction, serialized as MongoDB's `1` / `-1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_i64()? {
            1 => Some(SortDirection::Ascending),
            -1 => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

/// Options for find queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// field → include (true) / exclude (false); `_id` may be excluded in include mode
    pub projection: Option<Vec<(String, bool)>>,

    /// Sort keys in priority order
    pub sort: Option<Vec<(String, SortDirection)>>,

    pub limit: Option<usize>,

    /// Number of documents to skip (pagination)
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include only `fields`, dropping `_id`
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        let mut projection: Vec<(String, bool)> =
            fields.iter().map(|f| (f.to_string(), true)).collect();
        projection.push(("_id".to_string(), false));
        self.projection = Some(projection);
        self
    }

    pub fn with_sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort
            .get_or_insert_with(Vec::new)
            .push((field.to_string(), direction));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Projection as a MongoDB document, e.g. `{"title": 1, "_id": 0}`
    pub fn projection_document(&self) -> Option<Value> {
        self.projection.as_ref().map(|fields| {
            let map: Map<String, Value> = fields
                .iter()
                .map(|(field, include)| (field.clone(), json!(if *include { 1 } else { 0 })))
                .collect();
            Value::Object(map)
        })
    }

    /// Sort as a MongoDB document, e.g. `{"price": -1}`
    pub fn sort_document(&self) -> Option<Value> {
        self.sort.as_ref().map(|keys| {
            let map: Map<String, Value> = keys
                .iter()
                .map(|(field, direction)| (field.clone(), json!(direction.as_i32())))
                .collect();
            Value::Object(map)
        })
    }

    /// Sort, skip, limit, then project, in that order
    pub fn apply(&self, mut docs: Vec<Value>) -> Vec<Value> {
        if let Some(sort) = &self.sort {
            apply_sort(&mut docs, sort);
        }
        let docs = apply_limit_skip(docs, self.limit, self.skip);
        match &self.projection {
            Some(projection) => docs
                .iter()
                .map(|doc| apply_projection(doc, projection))
                .collect(),
            None => docs,
        }
    }
}

/// Apply projection to a document
///
/// Include mode when any field is included; `_id` rides along unless excluded.
pub fn apply_projection(doc: &Value, projection: &[(String, bool)]) -> Value {
    let Value::Object(obj) = doc else {
        return doc.clone();
    };
    if projection.is_empty() {
        return doc.clone();
    }

    let include_mode = projection.iter().any(|(_, include)| *include);
    let mut result = Map::new();

    if include_mode {
        let id_excluded = projection
            .iter()
            .any(|(field, include)| field == "_id" && !include);
        if !id_excluded {
            if let Some(id) = obj.get("_id") {
                result.insert("_id".to_string(), id.clone());
            }
        }
        for (field, include) in projection {
            if *include {
                if let Some(value) = get_nested_value(doc, field) {
                    result.insert(field.clone(), value.clone());
                }
            }
        }
    } else {
        for (key, value) in obj {
            if !projection.iter().any(|(field, _)| field == key) {
                result.insert(key.clone(), value.clone());
            }
        }
    }

    Value::Object(result)
}

/// Stable multi-key sort; missing fields sort first
pub fn apply_sort(docs: &mut [Value], sort: &[(String, SortDirection)]) {
    docs.sort_by(|a, b| {
        for (field, direction) in sort {
            let cmp = sort_order(get_nested_value(a, field), get_nested_value(b, field));
            if cmp != std::cmp::Ordering::Equal {
                return match direction {
                    SortDirection::Ascending => cmp,
                    SortDirection::Descending => cmp.reverse(),
                };
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// Apply skip then limit
pub fn apply_limit_skip(docs: Vec<Value>, limit: Option<usize>, skip: Option<usize>) -> Vec<Value> {
    docs.into_iter()
        .skip(skip.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}
