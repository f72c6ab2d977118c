//! Predicate expressions for querying map entries.
//!
//! Field names are dot-separated paths into the JSON document stored under a
//! key (e.g. `"address.city"`).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Filter expression evaluated against the JSON value of each entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Matches every entry.
    #[default]
    All,
    /// Field equals value.
    Eq { field: String, value: Value },
    /// Field not equals value.
    Ne { field: String, value: Value },
    /// Field less than value.
    Lt { field: String, value: Value },
    /// Field less than or equal to value.
    Le { field: String, value: Value },
    /// Field greater than value.
    Gt { field: String, value: Value },
    /// Field greater than or equal to value.
    Ge { field: String, value: Value },
    /// Field lies within `[from, to]`, both ends inclusive.
    Between { field: String, from: Value, to: Value },
    /// Field is in a set of values.
    In { field: String, values: Vec<Value> },
    /// Field is not in a set of values.
    NotIn { field: String, values: Vec<Value> },
    /// Field is null or absent.
    IsNull { field: String },
    /// Field is present and not null.
    IsNotNull { field: String },
    /// Field matches a LIKE pattern (`%` and `_` wildcards).
    Like { field: String, pattern: String },
    /// Case-insensitive LIKE.
    ILike { field: String, pattern: String },
    /// All conditions must be true.
    And(Vec<Predicate>),
    /// At least one condition must be true.
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
}

/// Operator families a store may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorClass {
    /// Equality, inequality, set membership and null checks.
    Equality,
    /// Ordering comparisons (`<`, `<=`, `>`, `>=`, between).
    Comparison,
    /// LIKE / ILIKE pattern matching.
    Pattern,
    /// Boolean combinators.
    Logical,
}

impl Predicate {
    /// Create a predicate matching every entry.
    pub fn all() -> Self {
        Predicate::All
    }

    /// Create an equality predicate.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a not-equal predicate.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a less-than predicate.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a less-than-or-equal predicate.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Le {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a greater-than predicate.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Gt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a greater-than-or-equal predicate.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ge {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create an inclusive range predicate.
    pub fn between(
        field: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        Predicate::Between {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create an IN predicate.
    pub fn in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            field: field.into(),
            values,
        }
    }

    /// Create a NOT IN predicate.
    pub fn not_in_values(field: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::NotIn {
            field: field.into(),
            values,
        }
    }

    /// Create an IS NULL predicate.
    pub fn is_null(field: impl Into<String>) -> Self {
        Predicate::IsNull {
            field: field.into(),
        }
    }

    /// Create an IS NOT NULL predicate.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Predicate::IsNotNull {
            field: field.into(),
        }
    }

    /// Create a LIKE predicate.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Create a case-insensitive LIKE predicate.
    pub fn ilike(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::ILike {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    /// Combine predicates with AND.
    pub fn and(predicates: Vec<Predicate>) -> Self {
        Predicate::And(predicates)
    }

    /// Combine predicates with OR.
    pub fn or(predicates: Vec<Predicate>) -> Self {
        Predicate::Or(predicates)
    }

    /// Negate a predicate.
    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    /// Short operator name, used in error messages.
    pub fn operator(&self) -> &'static str {
        match self {
            Predicate::All => "all",
            Predicate::Eq { .. } => "eq",
            Predicate::Ne { .. } => "ne",
            Predicate::Lt { .. } => "lt",
            Predicate::Le { .. } => "le",
            Predicate::Gt { .. } => "gt",
            Predicate::Ge { .. } => "ge",
            Predicate::Between { .. } => "between",
            Predicate::In { .. } => "in",
            Predicate::NotIn { .. } => "not_in",
            Predicate::IsNull { .. } => "is_null",
            Predicate::IsNotNull { .. } => "is_not_null",
            Predicate::Like { .. } => "like",
            Predicate::ILike { .. } => "ilike",
            Predicate::And(_) => "and",
            Predicate::Or(_) => "or",
            Predicate::Not(_) => "not",
        }
    }

    /// Operator family of this node (not of its children).
    pub fn class(&self) -> OperatorClass {
        match self {
            Predicate::All
            | Predicate::Eq { .. }
            | Predicate::Ne { .. }
            | Predicate::In { .. }
            | Predicate::NotIn { .. }
            | Predicate::IsNull { .. }
            | Predicate::IsNotNull { .. } => OperatorClass::Equality,
            Predicate::Lt { .. }
            | Predicate::Le { .. }
            | Predicate::Gt { .. }
            | Predicate::Ge { .. }
            | Predicate::Between { .. } => OperatorClass::Comparison,
            Predicate::Like { .. } | Predicate::ILike { .. } => OperatorClass::Pattern,
            Predicate::And(_) | Predicate::Or(_) | Predicate::Not(_) => OperatorClass::Logical,
        }
    }

    /// Find the first node, depth first, whose class is rejected by `allowed`.
    pub fn find_unsupported<F>(&self, allowed: &F) -> Option<&Predicate>
    where
        F: Fn(OperatorClass) -> bool,
    {
        if !allowed(self.class()) {
            return Some(self);
        }
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().find_map(|c| c.find_unsupported(allowed))
            }
            Predicate::Not(inner) => inner.find_unsupported(allowed),
            _ => None,
        }
    }

    /// Extract all field paths referenced by the predicate.
    pub fn fields(&self) -> HashSet<String> {
        let mut fields = HashSet::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields(&self, fields: &mut HashSet<String>) {
        match self {
            Predicate::All => {}
            Predicate::Eq { field, .. }
            | Predicate::Ne { field, .. }
            | Predicate::Lt { field, .. }
            | Predicate::Le { field, .. }
            | Predicate::Gt { field, .. }
            | Predicate::Ge { field, .. }
            | Predicate::Between { field, .. }
            | Predicate::In { field, .. }
            | Predicate::NotIn { field, .. }
            | Predicate::IsNull { field }
            | Predicate::IsNotNull { field }
            | Predicate::Like { field, .. }
            | Predicate::ILike { field, .. } => {
                fields.insert(field.clone());
            }
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_fields(fields);
                }
            }
            Predicate::Not(inner) => inner.collect_fields(fields),
        }
    }
}
