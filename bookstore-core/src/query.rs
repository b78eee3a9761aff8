// bookstore-core/src/query.rs
//! MongoDB-style filter matching for the in-memory store
//!
//! Each query operator is a separate type implementing [`OperatorMatcher`],
//! looked up by name in [`OPERATOR_REGISTRY`]. Field conditions go through
//! the registry; top-level logical operators (`$and`, `$or`, `$nor`) recurse
//! into [`matches_filter`].
//!
//! ```
//! use serde_json::json;
//! use bookstore_core::query::matches_filter;
//!
//! let book = json!({"title": "1984", "published_year": 1949, "in_stock": true});
//! assert!(matches_filter(&book, &json!({"in_stock": true, "published_year": {"$lt": 1950}})).unwrap());
//! ```

use crate::error::{BookstoreError, Result};
use crate::value_utils::{compare_values, get_nested_value, values_equal};
use lazy_static::lazy_static;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Trait for all query operators
pub trait OperatorMatcher: Send + Sync {
    /// Operator name, e.g. "$gt"
    fn name(&self) -> &'static str;

    /// `doc_value` is the field value (None if missing); `document` is the whole
    /// document for operators that recurse.
    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Value>,
    ) -> Result<bool>;
}

// ============================================================================
// COMPARISON OPERATORS
// ============================================================================

/// `{ field: { $eq: value } }`, shorthand `{ field: value }`
pub struct EqOperator;

impl OperatorMatcher for EqOperator {
    fn name(&self) -> &'static str {
        "$eq"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Value>,
    ) -> Result<bool> {
        Ok(equals_or_contains(doc_value, filter_value))
    }
}

pub struct NeOperator;

impl OperatorMatcher for NeOperator {
    fn name(&self) -> &'static str {
        "$ne"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Value>,
    ) -> Result<bool> {
        Ok(!equals_or_contains(doc_value, filter_value))
    }
}

pub struct GtOperator;

impl OperatorMatcher for GtOperator {
    fn name(&self) -> &'static str {
        "$gt"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Value>,
    ) -> Result<bool> {
        Ok(compare_with_predicate(doc_value, filter_value, |ord| {
            ord == Ordering::Greater
        }))
    }
}

pub struct GteOperator;

impl OperatorMatcher for GteOperator {
    fn name(&self) -> &'static str {
        "$gte"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Value>,
    ) -> Result<bool> {
        Ok(compare_with_predicate(doc_value, filter_value, |ord| {
            ord != Ordering::Less
        }))
    }
}

pub struct LtOperator;

impl OperatorMatcher for LtOperator {
    fn name(&self) -> &'static str {
        "$lt"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Value>,
    ) -> Result<bool> {
        Ok(compare_with_predicate(doc_value, filter_value, |ord| {
            ord == Ordering::Less
        }))
    }
}

pub struct LteOperator;

impl OperatorMatcher for LteOperator {
    fn name(&self) -> &'static str {
        "$lte"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Value>,
    ) -> Result<bool> {
        Ok(compare_with_predicate(doc_value, filter_value, |ord| {
            ord != Ordering::Greater
        }))
    }
}

/// `{ field: { $in: [v1, v2] } }`
pub struct InOperator;

impl OperatorMatcher for InOperator {
    fn name(&self) -> &'static str {
        "$in"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Value>,
    ) -> Result<bool> {
        let candidates = expect_array(self.name(), filter_value)?;
        Ok(candidates
            .iter()
            .any(|candidate| equals_or_contains(doc_value, candidate)))
    }
}

/// `{ field: { $nin: [v1, v2] } }`, true when the field is missing
pub struct NinOperator;

impl OperatorMatcher for NinOperator {
    fn name(&self) -> &'static str {
        "$nin"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Value>,
    ) -> Result<bool> {
        let candidates = expect_array(self.name(), filter_value)?;
        Ok(!candidates
            .iter()
            .any(|candidate| equals_or_contains(doc_value, candidate)))
    }
}

// ============================================================================
// ELEMENT OPERATORS
// ============================================================================

/// `{ field: { $exists: bool } }`
pub struct ExistsOperator;

impl OperatorMatcher for ExistsOperator {
    fn name(&self) -> &'static str {
        "$exists"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        _document: Option<&Value>,
    ) -> Result<bool> {
        let should_exist = match filter_value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            _ => {
                return Err(BookstoreError::InvalidQuery(
                    "$exists requires a boolean".to_string(),
                ))
            }
        };
        Ok(doc_value.is_some() == should_exist)
    }
}

// ============================================================================
// LOGICAL OPERATORS
// ============================================================================

/// `{ $and: [ {..}, {..} ] }`
pub struct AndOperator;

impl OperatorMatcher for AndOperator {
    fn name(&self) -> &'static str {
        "$and"
    }

    fn matches(
        &self,
        _doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Value>,
    ) -> Result<bool> {
        let doc = require_document(self.name(), document)?;
        for condition in expect_array(self.name(), filter_value)? {
            if !matches_filter(doc, condition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// `{ $or: [ {..}, {..} ] }`
pub struct OrOperator;

impl OperatorMatcher for OrOperator {
    fn name(&self) -> &'static str {
        "$or"
    }

    fn matches(
        &self,
        _doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Value>,
    ) -> Result<bool> {
        let doc = require_document(self.name(), document)?;
        for condition in expect_array(self.name(), filter_value)? {
            if matches_filter(doc, condition)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// `{ $nor: [ {..}, {..} ] }`, true only if every clause fails
pub struct NorOperator;

impl OperatorMatcher for NorOperator {
    fn name(&self) -> &'static str {
        "$nor"
    }

    fn matches(
        &self,
        doc_value: Option<&Value>,
        filter_value: &Value,
        document: Option<&Value>,
    ) -> Result<bool> {
        OrOperator
            .matches(doc_value, filter_value, document)
            .map(|any| !any)
    }
}

// ============================================================================
// OPERATOR REGISTRY
// ============================================================================

lazy_static! {
    /// Global registry of query operators, keyed by operator name
    pub static ref OPERATOR_REGISTRY: HashMap<&'static str, Box<dyn OperatorMatcher>> = {
        let operators: Vec<Box<dyn OperatorMatcher>> = vec![
            Box::new(EqOperator),
            Box::new(NeOperator),
            Box::new(GtOperator),
            Box::new(GteOperator),
            Box::new(LtOperator),
            Box::new(LteOperator),
            Box::new(InOperator),
            Box::new(NinOperator),
            Box::new(ExistsOperator),
            Box::new(AndOperator),
            Box::new(OrOperator),
            Box::new(NorOperator),
        ];
        operators.into_iter().map(|op| (op.name(), op)).collect()
    };
}

fn lookup_operator(name: &str) -> Result<&'static dyn OperatorMatcher> {
    OPERATOR_REGISTRY
        .get(name)
        .map(|op| op.as_ref())
        .ok_or_else(|| BookstoreError::InvalidQuery(format!("Unknown operator: {}", name)))
}

// ============================================================================
// HELPERS
// ============================================================================

fn equals_or_contains(doc_value: Option<&Value>, filter_value: &Value) -> bool {
    match doc_value {
        None => filter_value.is_null(),
        Some(v) if values_equal(v, filter_value) => true,
        // Array fields match when any element equals the filter value
        Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, filter_value)),
        Some(_) => false,
    }
}

fn compare_with_predicate<F>(doc_value: Option<&Value>, filter_value: &Value, predicate: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    match doc_value {
        None => false,
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare_values(item, filter_value).map(&predicate).unwrap_or(false)),
        Some(v) => compare_values(v, filter_value)
            .map(&predicate)
            .unwrap_or(false),
    }
}

fn expect_array<'a>(op: &str, value: &'a Value) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| BookstoreError::InvalidQuery(format!("{} requires an array", op)))
}

fn require_document<'a>(op: &str, document: Option<&'a Value>) -> Result<&'a Value> {
    document.ok_or_else(|| {
        BookstoreError::InvalidQuery(format!("{} operator requires document context", op))
    })
}

/// Evaluate one field condition: an operator object or an implicit `$eq`
fn matches_condition(document: &Value, field: &str, condition: &Value) -> Result<bool> {
    let doc_value = get_nested_value(document, field);

    match condition {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            for (op_name, op_value) in ops {
                if !lookup_operator(op_name)?.matches(doc_value, op_value, Some(document))? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        literal => Ok(equals_or_contains(doc_value, literal)),
    }
}

/// Main entry point for filter matching
///
/// An empty filter matches every document; a non-object filter is an error.
pub fn matches_filter(document: &Value, filter: &Value) -> Result<bool> {
    let filter_obj = filter
        .as_object()
        .ok_or_else(|| BookstoreError::InvalidQuery("Filter must be an object".to_string()))?;

    for (key, value) in filter_obj {
        let matched = if key.starts_with('$') {
            lookup_operator(key)?.matches(None, value, Some(document))?
        } else {
            matches_condition(document, key, value)?
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Field names a filter constrains at the top level (including inside `$and`)
pub fn constrained_fields(filter: &Value) -> Vec<String> {
    let mut fields = Vec::new();
    if let Some(obj) = filter.as_object() {
        for (key, value) in obj {
            let found = if key == "$and" {
                value
                    .as_array()
                    .into_iter()
                    .flatten()
                    .flat_map(constrained_fields)
                    .collect()
            } else if !key.starts_with('$') {
                vec![key.clone()]
            } else {
                Vec::new()
            };
            for field in found {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
    }
    fields
}

/// The part of a filter that concerns `field`, as a standalone filter
pub fn field_condition(filter: &Value, field: &str) -> Option<Value> {
    let obj = filter.as_object()?;
    if let Some(condition) = obj.get(field) {
        return Some(serde_json::json!({ field: condition }));
    }
    let clauses: Vec<Value> = obj
        .get("$and")?
        .as_array()?
        .iter()
        .filter_map(|clause| field_condition(clause, field))
        .collect();
    (!clauses.is_empty()).then(|| serde_json::json!({ "$and": clauses }))
}
