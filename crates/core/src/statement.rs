//! Fully bound, executable statements.

use crate::category::Category;
use crate::descriptor::{SortKey, SortOrder, StatementKind};
use crate::expression::{Expression, compare_values};
use crate::param::Record;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// A bound read against one category.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub category: Arc<Category>,
    pub where_expr: Option<Expression>,
    pub sort: Vec<SortKey>,
    pub limit: Option<usize>,
}

impl Query {
    /// An unrestricted query over every record of the category.
    pub fn new(category: Arc<Category>) -> Self {
        Self {
            category,
            where_expr: None,
            sort: Vec::new(),
            limit: None,
        }
    }

    /// Conjoin an extra predicate with the existing where clause.
    pub fn restrict(mut self, expr: Expression) -> Self {
        self.where_expr = Some(match self.where_expr.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.where_expr
            .as_ref()
            .is_none_or(|expr| expr.evaluate(record))
    }

    /// Order records by the sort keys, then truncate to the limit.
    pub fn finish(&self, mut records: Vec<Record>) -> Vec<Record> {
        if !self.sort.is_empty() {
            records.sort_by(|a, b| self.compare(a, b));
        }
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
        records
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for SortKey { key, order } in &self.sort {
            let lhs = a.get(key).unwrap_or(&Value::Null);
            let rhs = b.get(key).unwrap_or(&Value::Null);
            // Records missing the key sort last in either direction.
            let ordering = match (lhs.is_null(), rhs.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => {
                    let ordering = compare_values(lhs, rhs).unwrap_or(Ordering::Equal);
                    match order {
                        SortOrder::Ascending => ordering,
                        SortOrder::Descending => ordering.reverse(),
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// A bound data-modifying statement.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteStatement {
    Add {
        category: Arc<Category>,
        record: Record,
    },
    /// Replace matching records with `record`, inserting it when none match.
    Replace {
        category: Arc<Category>,
        record: Record,
        where_expr: Option<Expression>,
    },
    /// Merge `updates` into every matching record.
    Update {
        category: Arc<Category>,
        updates: Record,
        where_expr: Option<Expression>,
    },
    Remove {
        category: Arc<Category>,
        where_expr: Option<Expression>,
    },
}

impl WriteStatement {
    /// Whether a record is targeted by this statement; `Add` targets none.
    pub fn targets(&self, record: &Record) -> bool {
        match self {
            Self::Add { .. } => false,
            Self::Replace { where_expr, .. }
            | Self::Update { where_expr, .. }
            | Self::Remove { where_expr, .. } => where_expr
                .as_ref()
                .is_none_or(|expr| expr.evaluate(record)),
        }
    }

    pub fn category(&self) -> &Arc<Category> {
        match self {
            Self::Add { category, .. }
            | Self::Replace { category, .. }
            | Self::Update { category, .. }
            | Self::Remove { category, .. } => category,
        }
    }

    pub fn kind(&self) -> StatementKind {
        match self {
            Self::Add { .. } => StatementKind::Add,
            Self::Replace { .. } => StatementKind::Replace,
            Self::Update { .. } => StatementKind::Update,
            Self::Remove { .. } => StatementKind::Remove,
        }
    }
}

/// A statement ready to hand to storage.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutableStatement {
    Query(Query),
    /// Count of records matching the query, against an aggregate category.
    Count(Query),
    Write(WriteStatement),
}

impl ExecutableStatement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Self::Query(_) => StatementKind::Query,
            Self::Count(_) => StatementKind::Count,
            Self::Write(write) => write.kind(),
        }
    }
}
