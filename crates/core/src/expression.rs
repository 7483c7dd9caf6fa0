//! Boolean where-expressions over record keys.

use crate::param::{ParamType, Parameter, Record};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// A free parameter slot in a compiled template.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreeParam {
    /// Zero-based position in the parameter array.
    pub index: usize,
    /// Declared type.
    pub ty: ParamType,
}

/// Right-hand side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Literal(Value),
    Param(FreeParam),
}

impl Operand {
    fn bind(&self, params: &[Parameter]) -> Self {
        match self {
            Self::Param(slot) => params
                .get(slot.index)
                .map(|p| Self::Literal(p.to_value()))
                .unwrap_or_else(|| self.clone()),
            Self::Literal(_) => self.clone(),
        }
    }

    /// The bound value, or `None` while the operand is still a free slot.
    pub fn literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Param(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(Value::String(s)) => write!(f, "'{s}'"),
            Self::Literal(v) => write!(f, "{v}"),
            Self::Param(slot) => write!(f, "{}", slot.ty),
        }
    }
}

/// Binary comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
        }
    }
}

/// A boolean expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Compare {
        key: String,
        op: CompareOp,
        operand: Operand,
    },
    In {
        key: String,
        operand: Operand,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

impl Expression {
    /// `key = value` with a bound literal.
    pub fn equal_to(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Compare {
            key: key.into(),
            op: CompareOp::Eq,
            operand: Operand::Literal(value.into()),
        }
    }

    /// `key IN [values]` with bound literals.
    pub fn in_values<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            key: key.into(),
            operand: Operand::Literal(Value::Array(values.into_iter().map(Into::into).collect())),
        }
    }

    /// Conjunction `self AND other`.
    pub fn and(self, other: Expression) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Replace every free slot with the corresponding parameter value.
    ///
    /// Callers validate arity and types first; slots with no parameter stay
    /// unbound and never match.
    pub fn bind(&self, params: &[Parameter]) -> Self {
        match self {
            Self::Compare { key, op, operand } => Self::Compare {
                key: key.clone(),
                op: *op,
                operand: operand.bind(params),
            },
            Self::In { key, operand } => Self::In {
                key: key.clone(),
                operand: operand.bind(params),
            },
            Self::And(l, r) => Self::And(Box::new(l.bind(params)), Box::new(r.bind(params))),
            Self::Or(l, r) => Self::Or(Box::new(l.bind(params)), Box::new(r.bind(params))),
            Self::Not(inner) => Self::Not(Box::new(inner.bind(params))),
        }
    }

    /// Evaluate against a record. Missing keys compare as `null`.
    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Self::Compare { key, op, operand } => {
                let Some(rhs) = operand.literal() else {
                    return false;
                };
                let lhs = record.get(key).unwrap_or(&Value::Null);
                match op {
                    CompareOp::Eq => values_equal(lhs, rhs),
                    CompareOp::NotEq => !values_equal(lhs, rhs),
                    CompareOp::Less => compare_values(lhs, rhs) == Some(Ordering::Less),
                    CompareOp::LessEq => matches!(
                        compare_values(lhs, rhs),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    CompareOp::Greater => compare_values(lhs, rhs) == Some(Ordering::Greater),
                    CompareOp::GreaterEq => matches!(
                        compare_values(lhs, rhs),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                }
            }
            Self::In { key, operand } => {
                let Some(Value::Array(candidates)) = operand.literal() else {
                    return false;
                };
                let lhs = record.get(key).unwrap_or(&Value::Null);
                candidates.iter().any(|c| values_equal(lhs, c))
            }
            Self::And(l, r) => l.evaluate(record) && r.evaluate(record),
            Self::Or(l, r) => l.evaluate(record) || r.evaluate(record),
            Self::Not(inner) => !inner.evaluate(record),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { key, op, operand } => {
                write!(f, "'{key}' {} {operand}", op.as_str())
            }
            Self::In { key, operand } => write!(f, "'{key}' IN {operand}"),
            Self::And(l, r) => write!(f, "({l} AND {r})"),
            Self::Or(l, r) => write!(f, "({l} OR {r})"),
            Self::Not(inner) => write!(f, "NOT {inner}"),
        }
    }
}

/// Total-enough ordering for JSON scalars; `None` for incomparable kinds.
pub fn compare_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                Some(a.cmp(&b))
            } else {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    compare_values(lhs, rhs) == Some(Ordering::Equal) || lhs == rhs
}
