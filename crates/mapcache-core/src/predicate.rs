//! Predicate evaluation against stored JSON documents.
//!
//! This module provides the `PredicateEvaluator` that evaluates predicate
//! expressions against the JSON value stored under a key.

use std::cmp::Ordering;

use mapcache_proto::{Payload, Predicate, Value};
use serde_json::Value as Json;

/// Evaluates predicates against JSON documents.
pub struct PredicateEvaluator;

impl PredicateEvaluator {
    /// Evaluate a predicate against a stored payload.
    ///
    /// Payloads that are not tagged JSON, or whose bytes do not parse, only
    /// satisfy [`Predicate::All`].
    pub fn matches_payload(predicate: &Predicate, payload: &Payload) -> bool {
        if matches!(predicate, Predicate::All) {
            return true;
        }
        match payload.to_document() {
            Ok(document) => Self::evaluate(predicate, &document),
            Err(_) => false,
        }
    }

    /// Evaluate a predicate against a document.
    ///
    /// Returns `true` if the document matches, `false` otherwise.
    pub fn evaluate(predicate: &Predicate, document: &Json) -> bool {
        match predicate {
            Predicate::All => true,
            Predicate::Eq { field, value } => {
                Self::compare_field(document, field, value, Self::values_equal)
            }
            Predicate::Ne { field, value } => match Self::field(document, field) {
                Some(fv) => !Self::json_equals(fv, value),
                None => true,
            },
            Predicate::Lt { field, value } => {
                Self::compare_field(document, field, value, |a, b| {
                    Self::compare_values(a, b).map(|ord| ord.is_lt()).unwrap_or(false)
                })
            }
            Predicate::Le { field, value } => {
                Self::compare_field(document, field, value, |a, b| {
                    Self::compare_values(a, b).map(|ord| ord.is_le()).unwrap_or(false)
                })
            }
            Predicate::Gt { field, value } => {
                Self::compare_field(document, field, value, |a, b| {
                    Self::compare_values(a, b).map(|ord| ord.is_gt()).unwrap_or(false)
                })
            }
            Predicate::Ge { field, value } => {
                Self::compare_field(document, field, value, |a, b| {
                    Self::compare_values(a, b).map(|ord| ord.is_ge()).unwrap_or(false)
                })
            }
            Predicate::Between { field, from, to } => {
                match Self::field(document, field).and_then(Value::from_json) {
                    Some(fv) => {
                        let lower = Self::compare_values(&fv, from).map(|o| o.is_ge());
                        let upper = Self::compare_values(&fv, to).map(|o| o.is_le());
                        lower.unwrap_or(false) && upper.unwrap_or(false)
                    }
                    None => false,
                }
            }
            Predicate::In { field, values } => match Self::field(document, field) {
                Some(fv) => values.iter().any(|v| Self::json_equals(fv, v)),
                None => false,
            },
            Predicate::NotIn { field, values } => match Self::field(document, field) {
                Some(fv) => !values.iter().any(|v| Self::json_equals(fv, v)),
                None => true, // absent is not in any set
            },
            Predicate::IsNull { field } => {
                matches!(Self::field(document, field), None | Some(Json::Null))
            }
            Predicate::IsNotNull { field } => {
                !matches!(Self::field(document, field), None | Some(Json::Null))
            }
            Predicate::Like { field, pattern } => match Self::field(document, field) {
                Some(Json::String(s)) => Self::like_match(s, pattern),
                _ => false,
            },
            Predicate::ILike { field, pattern } => match Self::field(document, field) {
                Some(Json::String(s)) => {
                    Self::like_match(&s.to_lowercase(), &pattern.to_lowercase())
                }
                _ => false,
            },
            Predicate::And(children) => children.iter().all(|c| Self::evaluate(c, document)),
            Predicate::Or(children) => children.iter().any(|c| Self::evaluate(c, document)),
            Predicate::Not(inner) => !Self::evaluate(inner, document),
        }
    }

    /// Resolve a dot-separated path inside a document.
    fn field<'a>(document: &'a Json, path: &str) -> Option<&'a Json> {
        path.split('.')
            .try_fold(document, |current, segment| current.get(segment))
    }

    /// Compare a scalar field with a comparator function.
    fn compare_field<F>(document: &Json, field: &str, value: &Value, comparator: F) -> bool
    where
        F: FnOnce(&Value, &Value) -> bool,
    {
        match Self::field(document, field).and_then(Value::from_json) {
            Some(fv) => comparator(&fv, value),
            None => false, // missing or composite field doesn't match
        }
    }

    fn json_equals(field: &Json, value: &Value) -> bool {
        Value::from_json(field)
            .map(|fv| Self::values_equal(&fv, value))
            .unwrap_or(false)
    }

    /// Check if two values are equal.
    fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                Self::cmp_int_float(*a, *b) == Some(Ordering::Equal)
            }
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Compare two values, returning their ordering if comparable.
    fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => Self::cmp_int_float(*a, *b),
            (Value::Float(a), Value::Int(b)) => Self::cmp_int_float(*b, *a).map(Ordering::reverse),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None, // Incompatible types
        }
    }

    /// Exact ordering of an integer against a float, without rounding the
    /// integer through `f64`.
    fn cmp_int_float(int: i64, float: f64) -> Option<Ordering> {
        // 2^63, the first float past i64::MAX
        const BOUND: f64 = 9_223_372_036_854_775_808.0;

        if float.is_nan() {
            return None;
        }
        if float >= BOUND {
            return Some(Ordering::Less);
        }
        if float < -BOUND {
            return Some(Ordering::Greater);
        }

        let whole = float.trunc();
        match int.cmp(&(whole as i64)) {
            Ordering::Equal if float > whole => Some(Ordering::Less),
            Ordering::Equal if float < whole => Some(Ordering::Greater),
            ordering => Some(ordering),
        }
    }

    /// Match a string against a SQL LIKE pattern.
    ///
    /// Supports:
    /// - `%` matches zero or more characters
    /// - `_` matches exactly one character
    /// - `\\%` matches literal `%`
    /// - `\\_` matches literal `_`
    pub fn like_match(value: &str, pattern: &str) -> bool {
        let value: Vec<char> = value.chars().collect();
        let pattern: Vec<char> = pattern.chars().collect();
        Self::like_match_from(&value, &pattern)
    }

    fn like_match_from(value: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => value.is_empty(),
            Some(('%', rest)) => {
                if rest.is_empty() {
                    return true;
                }
                (0..=value.len()).any(|skip| Self::like_match_from(&value[skip..], rest))
            }
            Some(('_', rest)) => !value.is_empty() && Self::like_match_from(&value[1..], rest),
            Some(('\\', rest)) => match (rest.split_first(), value.split_first()) {
                (Some((p, rest)), Some((c, tail))) if p == c => Self::like_match_from(tail, rest),
                _ => false,
            },
            Some((p, rest)) => match value.split_first() {
                Some((c, tail)) if c == p => Self::like_match_from(tail, rest),
                _ => false,
            },
        }
    }
}
