// src/aggregation.rs
// Aggregation pipeline for the in-memory store

use crate::error::{BookstoreError, Result};
use crate::find_options::{apply_sort, SortDirection};
use crate::query::matches_filter;
use crate::value_utils::{compare_values, get_nested_value, number_value};
use serde_json::{Map, Value};
use std::collections::HashMap;

fn agg_err(msg: impl Into<String>) -> BookstoreError {
    BookstoreError::AggregationError(msg.into())
}

/// Aggregation pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

/// Pipeline stage
#[derive(Debug, Clone)]
pub enum Stage {
    Match(Value),
    Project(ProjectStage),
    Group(GroupStage),
    Sort(Vec<(String, SortDirection)>),
    Limit(usize),
    Skip(usize),
}

/// $project stage - reshape documents
#[derive(Debug, Clone)]
pub struct ProjectStage {
    fields: Vec<(String, ProjectField)>,
}

#[derive(Debug, Clone)]
pub enum ProjectField {
    Include,
    Exclude,
    /// Computed value: `"$field"` reference or operator expression
    Computed(Value),
}

/// $group stage - group documents and compute accumulators
#[derive(Debug, Clone)]
pub struct GroupStage {
    id: Value,
    accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone)]
pub enum Accumulator {
    Sum(Value),
    Avg(Value),
    Min(Value),
    Max(Value),
    Push(Value),
    First(Value),
    Last(Value),
}

impl Pipeline {
    /// Parse a pipeline from a JSON array of stages
    pub fn from_json(pipeline: &[Value]) -> Result<Self> {
        let stages = pipeline
            .iter()
            .map(Stage::from_json)
            .collect::<Result<Vec<_>>>()?;
        Ok(Pipeline { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order
    pub fn execute(&self, mut docs: Vec<Value>) -> Result<Vec<Value>> {
        for stage in &self.stages {
            docs = stage.execute(docs)?;
        }
        Ok(docs)
    }
}

impl Stage {
    fn from_json(stage: &Value) -> Result<Self> {
        let obj = stage
            .as_object()
            .ok_or_else(|| agg_err("Stage must be an object"))?;
        if obj.len() != 1 {
            return Err(agg_err("Each stage must have exactly one operator"));
        }
        let Some((name, spec)) = obj.iter().next() else {
            return Err(agg_err("Each stage must have exactly one operator"));
        };

        match name.as_str() {
            "$match" => {
                if !spec.is_object() {
                    return Err(agg_err("$match must be an object"));
                }
                Ok(Stage::Match(spec.clone()))
            }
            "$project" => Ok(Stage::Project(ProjectStage::from_json(spec)?)),
            "$group" => Ok(Stage::Group(GroupStage::from_json(spec)?)),
            "$sort" => {
                let keys = spec
                    .as_object()
                    .ok_or_else(|| agg_err("$sort must be an object"))?
                    .iter()
                    .map(|(field, dir)| {
                        SortDirection::from_value(dir)
                            .map(|d| (field.clone(), d))
                            .ok_or_else(|| agg_err("Sort direction must be 1 or -1"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Stage::Sort(keys))
            }
            "$limit" => Ok(Stage::Limit(parse_count(spec, "$limit")?)),
            "$skip" => Ok(Stage::Skip(parse_count(spec, "$skip")?)),
            other => Err(agg_err(format!("Unknown pipeline stage: {}", other))),
        }
    }

    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        match self {
            Stage::Match(filter) => {
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches_filter(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                Ok(kept)
            }
            Stage::Project(stage) => docs.iter().map(|doc| stage.project(doc)).collect(),
            Stage::Group(stage) => stage.execute(docs),
            Stage::Sort(keys) => {
                let mut docs = docs;
                apply_sort(&mut docs, keys);
                Ok(docs)
            }
            Stage::Limit(n) => Ok(docs.into_iter().take(*n).collect()),
            Stage::Skip(n) => Ok(docs.into_iter().skip(*n).collect()),
        }
    }
}

fn parse_count(spec: &Value, op: &str) -> Result<usize> {
    spec.as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| agg_err(format!("{} must be a non-negative integer", op)))
}

impl ProjectStage {
    fn from_json(spec: &Value) -> Result<Self> {
        let obj = spec
            .as_object()
            .ok_or_else(|| agg_err("$project must be an object"))?;

        let mut fields = Vec::with_capacity(obj.len());
        for (field, value) in obj {
            let action = match value {
                Value::Bool(true) => ProjectField::Include,
                Value::Bool(false) => ProjectField::Exclude,
                Value::Number(n) => match n.as_i64() {
                    Some(0) => ProjectField::Exclude,
                    Some(1) => ProjectField::Include,
                    _ => return Err(agg_err(format!("Invalid project value: {}", n))),
                },
                Value::String(s) if s.starts_with('$') => ProjectField::Computed(value.clone()),
                Value::Object(_) => ProjectField::Computed(value.clone()),
                other => {
                    return Err(agg_err(format!("Invalid project expression: {}", other)));
                }
            };
            fields.push((field.clone(), action));
        }
        Ok(ProjectStage { fields })
    }

    fn project(&self, doc: &Value) -> Result<Value> {
        let include_mode = self
            .fields
            .iter()
            .any(|(_, f)| !matches!(f, ProjectField::Exclude));
        let mut result = Map::new();

        if include_mode {
            let id_excluded = self
                .fields
                .iter()
                .any(|(field, f)| field == "_id" && matches!(f, ProjectField::Exclude));
            if !id_excluded {
                if let Some(id) = doc.get("_id") {
                    result.insert("_id".to_string(), id.clone());
                }
            }
            for (field, action) in &self.fields {
                match action {
                    ProjectField::Include => {
                        if let Some(value) = get_nested_value(doc, field) {
                            result.insert(field.clone(), value.clone());
                        }
                    }
                    ProjectField::Computed(expr) => {
                        result.insert(field.clone(), evaluate_expression(expr, doc)?);
                    }
                    ProjectField::Exclude => {}
                }
            }
        } else if let Value::Object(obj) = doc {
            for (key, value) in obj {
                if !self.fields.iter().any(|(field, _)| field == key) {
                    result.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Value::Object(result))
    }
}

impl GroupStage {
    fn from_json(spec: &Value) -> Result<Self> {
        let obj = spec
            .as_object()
            .ok_or_else(|| agg_err("$group must be an object"))?;
        let id = obj
            .get("_id")
            .cloned()
            .ok_or_else(|| agg_err("Group stage must have _id field"))?;

        let accumulators = obj
            .iter()
            .filter(|(field, _)| field.as_str() != "_id")
            .map(|(field, value)| Ok((field.clone(), Accumulator::from_json(value)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(GroupStage { id, accumulators })
    }

    /// Groups come out in first-seen order
    fn execute(&self, docs: Vec<Value>) -> Result<Vec<Value>> {
        let mut order: Vec<Value> = Vec::new();
        let mut groups: HashMap<String, Vec<Value>> = HashMap::new();

        for doc in docs {
            let key = evaluate_expression(&self.id, &doc)?;
            let slot = key.to_string();
            if !groups.contains_key(&slot) {
                order.push(key);
            }
            groups.entry(slot).or_default().push(doc);
        }

        let mut results = Vec::with_capacity(order.len());
        for key in order {
            let members = groups.remove(&key.to_string()).unwrap_or_default();
            let mut row = Map::new();
            row.insert("_id".to_string(), key);
            for (field, accumulator) in &self.accumulators {
                row.insert(field.clone(), accumulator.compute(&members)?);
            }
            results.push(Value::Object(row));
        }
        Ok(results)
    }
}

impl Accumulator {
    fn from_json(spec: &Value) -> Result<Self> {
        let obj = spec
            .as_object()
            .filter(|o| o.len() == 1)
            .ok_or_else(|| agg_err("Accumulator must have exactly one operator"))?;
        let Some((op, expr)) = obj.iter().next() else {
            return Err(agg_err("Accumulator must have exactly one operator"));
        };
        let expr = expr.clone();

        match op.as_str() {
            "$sum" => Ok(Accumulator::Sum(expr)),
            "$avg" => Ok(Accumulator::Avg(expr)),
            "$min" => Ok(Accumulator::Min(expr)),
            "$max" => Ok(Accumulator::Max(expr)),
            "$push" => Ok(Accumulator::Push(expr)),
            "$first" => Ok(Accumulator::First(expr)),
            "$last" => Ok(Accumulator::Last(expr)),
            other => Err(agg_err(format!("Unknown accumulator: {}", other))),
        }
    }

    fn compute(&self, docs: &[Value]) -> Result<Value> {
        match self {
            Accumulator::Sum(expr) => {
                let total: f64 = numeric_values(expr, docs)?.iter().sum();
                Ok(number_value(total))
            }
            Accumulator::Avg(expr) => {
                let values = numeric_values(expr, docs)?;
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let avg = values.iter().sum::<f64>() / values.len() as f64;
                Ok(serde_json::Number::from_f64(avg)
                    .map(Value::Number)
                    .unwrap_or(Value::Null))
            }
            Accumulator::Min(expr) => extremum(expr, docs, std::cmp::Ordering::Less),
            Accumulator::Max(expr) => extremum(expr, docs, std::cmp::Ordering::Greater),
            Accumulator::Push(expr) => docs
                .iter()
                .map(|doc| evaluate_expression(expr, doc))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Accumulator::First(expr) => docs
                .first()
                .map_or(Ok(Value::Null), |doc| evaluate_expression(expr, doc)),
            Accumulator::Last(expr) => docs
                .last()
                .map_or(Ok(Value::Null), |doc| evaluate_expression(expr, doc)),
        }
    }
}

/// Numeric results of `expr` per document; non-numbers are skipped like MongoDB does
fn numeric_values(expr: &Value, docs: &[Value]) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(docs.len());
    for doc in docs {
        if let Some(n) = evaluate_expression(expr, doc)?.as_f64() {
            values.push(n);
        }
    }
    Ok(values)
}

fn extremum(expr: &Value, docs: &[Value], wanted: std::cmp::Ordering) -> Result<Value> {
    let mut best: Option<Value> = None;
    for doc in docs {
        let value = evaluate_expression(expr, doc)?;
        if value.is_null() {
            continue;
        }
        let replace = match &best {
            None => true,
            Some(current) => compare_values(&value, current) == Some(wanted),
        };
        if replace {
            best = Some(value);
        }
    }
    Ok(best.unwrap_or(Value::Null))
}

/// Evaluate an aggregation expression against one document
///
/// `"$field"` resolves to the field (null when missing); `{"$op": [args]}`
/// applies an arithmetic operator; anything else is a literal.
pub fn evaluate_expression(expr: &Value, doc: &Value) -> Result<Value> {
    match expr {
        Value::String(s) if s.starts_with('$') => {
            Ok(get_nested_value(doc, &s[1..]).cloned().unwrap_or(Value::Null))
        }
        Value::Object(obj) if obj.len() == 1 && obj.keys().all(|k| k.starts_with('$')) => {
            let Some((op, args)) = obj.iter().next() else {
                return Ok(Value::Null);
            };
            let args = match args {
                Value::Array(items) => items
                    .iter()
                    .map(|arg| evaluate_expression(arg, doc))
                    .collect::<Result<Vec<_>>>()?,
                single => vec![evaluate_expression(single, doc)?],
            };
            apply_arithmetic(op, &args)
        }
        Value::Object(obj) => {
            let mut out = Map::new();
            for (key, value) in obj {
                out.insert(key.clone(), evaluate_expression(value, doc)?);
            }
            Ok(Value::Object(out))
        }
        literal => Ok(literal.clone()),
    }
}

fn apply_arithmetic(op: &str, args: &[Value]) -> Result<Value> {
    // Any null/missing operand makes the whole expression null
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let nums: Vec<f64> = args
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| agg_err(format!("{} only supports numeric operands, got {}", op, v)))
        })
        .collect::<Result<_>>()?;
    let all_integers = args.iter().all(|v| v.is_i64() || v.is_u64());

    let binary = |name: &str| -> Result<(f64, f64)> {
        match nums.as_slice() {
            [a, b] => Ok((*a, *b)),
            _ => Err(agg_err(format!("{} requires exactly two operands", name))),
        }
    };

    let result = match op {
        "$add" => nums.iter().sum(),
        "$multiply" => nums.iter().product(),
        "$subtract" => {
            let (a, b) = binary(op)?;
            a - b
        }
        "$divide" => {
            let (a, b) = binary(op)?;
            if b == 0.0 {
                return Err(agg_err("$divide by zero"));
            }
            return Ok(serde_json::Number::from_f64(a / b)
                .map(Value::Number)
                .unwrap_or(Value::Null));
        }
        "$mod" => {
            let (a, b) = binary(op)?;
            if b == 0.0 {
                return Err(agg_err("$mod by zero"));
            }
            a % b
        }
        other => return Err(agg_err(format!("Unknown expression operator: {}", other))),
    };

    if all_integers {
        Ok(Value::from(result as i64))
    } else {
        Ok(number_value(result))
    }
}
