//! Condition and update-action algebra shared by every store backend.
//!
//! Conditions are evaluated directly against attribute maps by the in-memory
//! store and rendered into expressions by the DynamoDB store.

use std::cmp::Ordering;
use std::ops::{BitAnd, BitOr, Not};

use serde_json::{Number, Value};

use super::{Attributes, Result, StoreError};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    /// Expression operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Ne => "<>",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }
}

/// A condition over top-level item attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        path: String,
        op: Comparator,
        value: Value,
    },
    Between {
        path: String,
        low: Value,
        high: Value,
    },
    BeginsWith {
        path: String,
        prefix: String,
    },
    Contains {
        path: String,
        value: Value,
    },
    Exists(String),
    NotExists(String),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    fn compare(path: impl Into<String>, op: Comparator, value: impl Into<Value>) -> Self {
        Condition::Compare {
            path: path.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, Comparator::Eq, value)
    }

    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, Comparator::Ne, value)
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, Comparator::Lt, value)
    }

    pub fn le(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, Comparator::Le, value)
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, Comparator::Gt, value)
    }

    pub fn ge(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, Comparator::Ge, value)
    }

    pub fn between(
        path: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Condition::Between {
            path: path.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn begins_with(path: impl Into<String>, prefix: impl Into<String>) -> Self {
        Condition::BeginsWith {
            path: path.into(),
            prefix: prefix.into(),
        }
    }

    pub fn contains(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Contains {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Condition::Exists(path.into())
    }

    pub fn not_exists(path: impl Into<String>) -> Self {
        Condition::NotExists(path.into())
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates the condition against an item's attributes.
    ///
    /// Comparisons against a missing attribute are false.
    pub fn evaluate(&self, attributes: &Attributes) -> bool {
        match self {
            Condition::Compare { path, op, value } => match attributes.get(path) {
                Some(actual) => compare_with(actual, *op, value),
                None => false,
            },
            Condition::Between { path, low, high } => match attributes.get(path) {
                Some(actual) => {
                    compare_with(actual, Comparator::Ge, low)
                        && compare_with(actual, Comparator::Le, high)
                }
                None => false,
            },
            Condition::BeginsWith { path, prefix } => attributes
                .get(path)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Condition::Contains { path, value } => match attributes.get(path) {
                Some(Value::String(s)) => value.as_str().is_some_and(|v| s.contains(v)),
                Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, value)),
                _ => false,
            },
            Condition::Exists(path) => attributes.contains_key(path),
            Condition::NotExists(path) => !attributes.contains_key(path),
            Condition::And(left, right) => left.evaluate(attributes) && right.evaluate(attributes),
            Condition::Or(left, right) => left.evaluate(attributes) || right.evaluate(attributes),
            Condition::Not(inner) => !inner.evaluate(attributes),
        }
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

/// Orders two values of the same scalar kind; numbers compare numerically.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match compare_values(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}

fn compare_with(actual: &Value, op: Comparator, expected: &Value) -> bool {
    match op {
        Comparator::Eq => values_equal(actual, expected),
        Comparator::Ne => !values_equal(actual, expected),
        Comparator::Lt => compare_values(actual, expected) == Some(Ordering::Less),
        Comparator::Le => matches!(
            compare_values(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Comparator::Gt => compare_values(actual, expected) == Some(Ordering::Greater),
        Comparator::Ge => matches!(
            compare_values(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

/// A single update applied by an UpdateItem-style operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// Overwrites an attribute.
    Set { path: String, value: Value },
    /// Deletes an attribute.
    Remove { path: String },
    /// Adds to a number (missing counts as zero) or unions into a set.
    Add { path: String, value: Value },
    /// Appends to a list attribute, creating it when missing.
    Append { path: String, values: Vec<Value> },
}

impl UpdateAction {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        UpdateAction::Set {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        UpdateAction::Remove { path: path.into() }
    }

    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        UpdateAction::Add {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn append(path: impl Into<String>, values: Vec<Value>) -> Self {
        UpdateAction::Append {
            path: path.into(),
            values,
        }
    }

    /// Attribute targeted by this action.
    pub fn path(&self) -> &str {
        match self {
            UpdateAction::Set { path, .. }
            | UpdateAction::Remove { path }
            | UpdateAction::Add { path, .. }
            | UpdateAction::Append { path, .. } => path,
        }
    }

    /// Applies the action to an attribute map in place.
    pub fn apply(&self, attributes: &mut Attributes) -> Result<()> {
        match self {
            UpdateAction::Set { path, value } => {
                attributes.insert(path.clone(), value.clone());
            }
            UpdateAction::Remove { path } => {
                attributes.remove(path);
            }
            UpdateAction::Add { path, value } => {
                let updated = match (attributes.get(path), value) {
                    (None, Value::Number(_)) | (None, Value::Array(_)) => value.clone(),
                    (Some(Value::Number(current)), Value::Number(delta)) => {
                        Value::Number(add_numbers(current, delta)?)
                    }
                    (Some(Value::Array(current)), Value::Array(extra)) => {
                        let mut merged = current.clone();
                        for v in extra {
                            if !merged.iter().any(|m| values_equal(m, v)) {
                                merged.push(v.clone());
                            }
                        }
                        Value::Array(merged)
                    }
                    _ => {
                        return Err(StoreError::InvalidData(format!(
                            "ADD requires a number or set for attribute: {}",
                            path
                        )))
                    }
                };
                attributes.insert(path.clone(), updated);
            }
            UpdateAction::Append { path, values } => match attributes.get_mut(path) {
                Some(Value::Array(current)) => current.extend(values.iter().cloned()),
                None => {
                    attributes.insert(path.clone(), Value::Array(values.clone()));
                }
                Some(_) => {
                    return Err(StoreError::InvalidData(format!(
                        "Cannot append to non-list attribute: {}",
                        path
                    )))
                }
            },
        }
        Ok(())
    }
}

fn add_numbers(a: &Number, b: &Number) -> Result<Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Number::from(sum));
        }
    }
    let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
    Number::from_f64(sum)
        .ok_or_else(|| StoreError::InvalidData(format!("Non-finite numeric result: {}", sum)))
}
