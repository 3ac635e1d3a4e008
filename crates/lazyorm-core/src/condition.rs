//! Search conditions handed to [`Repository::search`](crate::Repository::search).
//!
//! The lazy layer only ever builds "mapped-by field equals my id" comparisons,
//! but conditions coming from the query layer may be composites, so the type
//! covers both. Conditions are immutable once built.

use crate::Value;
use std::fmt;

/// Comparison operator of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    NotIn,
}

impl Operator {
    /// Symbol used when rendering a condition for logs and errors.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }
}

/// A single comparison or a composite of conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchCondition {
    /// `field <op> value`; `field` may be a dotted path.
    Compare {
        field: String,
        op: Operator,
        value: Value,
    },
    /// All nested conditions must hold.
    All(Vec<SearchCondition>),
    /// At least one nested condition must hold.
    Any(Vec<SearchCondition>),
}

impl SearchCondition {
    /// Build a comparison.
    pub fn compare(field: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        SearchCondition::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Build `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    /// Combine with another condition using AND.
    #[must_use]
    pub fn and(self, other: SearchCondition) -> Self {
        match self {
            SearchCondition::All(mut items) => {
                items.push(other);
                SearchCondition::All(items)
            }
            first => SearchCondition::All(vec![first, other]),
        }
    }

    /// Combine with another condition using OR.
    #[must_use]
    pub fn or(self, other: SearchCondition) -> Self {
        match self {
            SearchCondition::Any(mut items) => {
                items.push(other);
                SearchCondition::Any(items)
            }
            first => SearchCondition::Any(vec![first, other]),
        }
    }

    /// Field path of a single comparison.
    pub fn field(&self) -> Option<&str> {
        match self {
            SearchCondition::Compare { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Operator of a single comparison.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            SearchCondition::Compare { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Right-hand value of a single comparison.
    pub fn value(&self) -> Option<&Value> {
        match self {
            SearchCondition::Compare { value, .. } => Some(value),
            _ => None,
        }
    }

    /// A composite with no comparisons anywhere inside it.
    ///
    /// Such a condition matches nothing meaningful and is rejected wherever a
    /// condition is required.
    pub fn is_empty(&self) -> bool {
        match self {
            SearchCondition::Compare { .. } => false,
            SearchCondition::All(items) | SearchCondition::Any(items) => {
                items.iter().all(SearchCondition::is_empty)
            }
        }
    }
}

impl fmt::Display for SearchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchCondition::Compare { field, op, value } => {
                write!(f, "{} {} {}", field, op.symbol(), value)
            }
            SearchCondition::All(items) | SearchCondition::Any(items) => {
                let joiner = if matches!(self, SearchCondition::All(_)) {
                    " AND "
                } else {
                    " OR "
                };
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{joiner}")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}
