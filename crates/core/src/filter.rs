//! Authorization filter decisions.

use crate::expression::Expression;

/// Outcome of evaluating a principal's read policy for one request.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterResult {
    /// Run the statement unmodified.
    All,
    /// Conjoin this expression with the statement's where clause.
    QueryExpression(Expression),
    /// Never execute; the result is empty.
    Empty,
}

impl FilterResult {
    /// Combine two decisions: `Empty` dominates, expressions are ANDed and
    /// `All` is neutral.
    pub fn combine(self, other: FilterResult) -> FilterResult {
        match (self, other) {
            (Self::Empty, _) | (_, Self::Empty) => Self::Empty,
            (Self::All, other) | (other, Self::All) => other,
            (Self::QueryExpression(a), Self::QueryExpression(b)) => {
                Self::QueryExpression(a.and(b))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Label used in logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::QueryExpression(_) => "expression",
            Self::Empty => "empty",
        }
    }
}
