//! Value utility functions shared across modules
//!
//! Nested field access, value comparison and numeric helpers over
//! `serde_json::Value` documents.

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Get nested value from JSON with dot notation support
///
/// ```
/// use serde_json::json;
/// use bookstore_core::value_utils::get_nested_value;
///
/// let doc = json!({"publisher": {"city": "London"}});
/// assert_eq!(get_nested_value(&doc, "publisher.city"), Some(&json!("London")));
/// ```
pub fn get_nested_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    if !path.contains('.') {
        return doc.get(path);
    }

    let mut value = doc;
    for part in path.split('.') {
        match value {
            Value::Object(map) => value = map.get(part)?,
            Value::Array(arr) => value = arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        }
    }
    Some(value)
}

/// Set a value at a nested path, creating intermediate objects
pub fn set_nested_value(doc: &mut Value, path: &str, value: Value) {
    let mut parts = path.split('.').peekable();
    let mut current = doc;

    while let Some(part) = parts.next() {
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}

/// Remove a value at a nested path; returns the removed value
pub fn remove_nested_value(doc: &mut Value, path: &str) -> Option<Value> {
    match path.rsplit_once('.') {
        None => doc.as_object_mut()?.remove(path),
        Some((parent, leaf)) => {
            let mut current = doc;
            for part in parent.split('.') {
                current = current.as_object_mut()?.get_mut(part)?;
            }
            current.as_object_mut()?.remove(leaf)
        }
    }
}

/// Compare two JSON values
///
/// `Some(Ordering)` for numbers, strings and booleans of the same kind,
/// `None` for incompatible types.
///
/// ```
/// use serde_json::json;
/// use std::cmp::Ordering;
/// use bookstore_core::value_utils::compare_values;
///
/// assert_eq!(compare_values(&json!(1960), &json!(1950)), Some(Ordering::Greater));
/// assert_eq!(compare_values(&json!(10), &json!(10.0)), Some(Ordering::Equal));
/// assert_eq!(compare_values(&json!("a"), &json!(1)), None);
/// ```
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(n1), Value::Number(n2)) => compare_numbers(n1, n2),
        (Value::String(s1), Value::String(s2)) => Some(s1.cmp(s2)),
        (Value::Bool(b1), Value::Bool(b2)) => Some(b1.cmp(b2)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn compare_numbers(n1: &Number, n2: &Number) -> Option<Ordering> {
    if let (Some(i1), Some(i2)) = (n1.as_i64(), n2.as_i64()) {
        return Some(i1.cmp(&i2));
    }
    n1.as_f64()?.partial_cmp(&n2.as_f64()?)
}

/// Equality that treats `10` and `10.0` as the same value
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Total ordering used by sort: missing < null < numbers < strings < objects < arrays < bools
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(av), Some(bv)) => compare_values(av, bv)
            .unwrap_or_else(|| type_rank(av).cmp(&type_rank(bv))),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Build a JSON number, keeping integers integral
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_nested_value() {
        let doc = json!({
            "title": "Dune",
            "publisher": {"name": "Chilton", "address": {"city": "Philadelphia"}},
            "editions": [{"year": 1965}, {"year": 1990}]
        });

        assert_eq!(get_nested_value(&doc, "title"), Some(&json!("Dune")));
        assert_eq!(
            get_nested_value(&doc, "publisher.address.city"),
            Some(&json!("Philadelphia"))
        );
        assert_eq!(get_nested_value(&doc, "editions.1.year"), Some(&json!(1990)));
        assert_eq!(get_nested_value(&doc, "publisher.missing"), None);
        assert_eq!(get_nested_value(&doc, "title.length"), None);
    }

    #[test]
    fn test_set_nested_value() {
        let mut doc = json!({"title": "Dune"});
        set_nested_value(&mut doc, "price", json!(9.5));
        set_nested_value(&mut doc, "stock.warehouse", json!(3));

        assert_eq!(doc["price"], json!(9.5));
        assert_eq!(doc["stock"]["warehouse"], json!(3));
    }

    #[test]
    fn test_remove_nested_value() {
        let mut doc = json!({"title": "Dune", "stock": {"warehouse": 3, "shop": 1}});
        assert_eq!(remove_nested_value(&mut doc, "stock.shop"), Some(json!(1)));
        assert_eq!(remove_nested_value(&mut doc, "title"), Some(json!("Dune")));
        assert_eq!(remove_nested_value(&mut doc, "missing.path"), None);
        assert_eq!(doc, json!({"stock": {"warehouse": 3}}));
    }

    #[test]
    fn test_integer_and_float_equal() {
        assert!(values_equal(&json!(1950), &json!(1950.0)));
        assert!(!values_equal(&json!(1950), &json!("1950")));
        assert!(values_equal(&json!("Fiction"), &json!("Fiction")));
    }

    #[test]
    fn test_sort_order_missing_first() {
        assert_eq!(sort_order(None, Some(&json!(1))), Ordering::Less);
        assert_eq!(sort_order(Some(&json!(1)), Some(&json!("a"))), Ordering::Less);
        assert_eq!(
            sort_order(Some(&json!(12.99)), Some(&json!(9.99))),
            Ordering::Greater
        );
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(1980.0), json!(1980));
        assert_eq!(number_value(10.5), json!(10.5));
    }
}
