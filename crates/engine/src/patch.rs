//! Binding parameter values into prepared statements.

use crate::error::PatchError;
use crate::statement::PreparedStatementHolder;
use gatehouse_core::descriptor::{Assignment, StatementKind, WHOLE_RECORD};
use gatehouse_core::expression::Operand;
use gatehouse_core::{ExecutableStatement, Parameter, Query, Record, WriteStatement};
use serde_json::Value;

/// Bind `params` into the holder's template.
///
/// Arity and every parameter's type must match the template exactly;
/// otherwise nothing is bound. The statement shape comes from the template.
pub fn patch(
    holder: &PreparedStatementHolder,
    params: &[Parameter],
) -> Result<ExecutableStatement, PatchError> {
    let template = &holder.template;

    if params.len() != template.params.len() {
        return Err(PatchError::Arity {
            expected: template.params.len(),
            actual: params.len(),
        });
    }
    for (index, (param, expected)) in params.iter().zip(&template.params).enumerate() {
        let actual = param.param_type();
        if actual != *expected {
            return Err(PatchError::TypeMismatch {
                index,
                expected: *expected,
                actual,
            });
        }
    }

    let category = holder.category.clone();
    let where_expr = template.where_expr.as_ref().map(|w| w.bind(params));

    let statement = match template.kind {
        StatementKind::Query | StatementKind::Count => {
            let query = Query {
                category,
                where_expr,
                sort: template.sort.clone(),
                limit: template
                    .limit
                    .as_ref()
                    .map(|limit| bind_limit(limit, params))
                    .transpose()?,
            };
            if template.kind == StatementKind::Count {
                ExecutableStatement::Count(query)
            } else {
                ExecutableStatement::Query(query)
            }
        }
        StatementKind::Add => ExecutableStatement::Write(WriteStatement::Add {
            category,
            record: build_record(&template.assignments, params),
        }),
        StatementKind::Replace => ExecutableStatement::Write(WriteStatement::Replace {
            category,
            record: build_record(&template.assignments, params),
            where_expr,
        }),
        StatementKind::Update => ExecutableStatement::Write(WriteStatement::Update {
            category,
            updates: build_record(&template.assignments, params),
            where_expr,
        }),
        StatementKind::Remove => ExecutableStatement::Write(WriteStatement::Remove {
            category,
            where_expr,
        }),
    };
    Ok(statement)
}

fn operand_value(operand: &Operand, params: &[Parameter]) -> Value {
    match operand {
        Operand::Literal(value) => value.clone(),
        Operand::Param(slot) => params
            .get(slot.index)
            .map_or(Value::Null, Parameter::to_value),
    }
}

fn bind_limit(limit: &Operand, params: &[Parameter]) -> Result<usize, PatchError> {
    match limit {
        Operand::Param(slot) => match params.get(slot.index) {
            Some(Parameter::Int(n)) => {
                usize::try_from(*n).map_err(|_| PatchError::NegativeLimit { index: slot.index })
            }
            _ => Err(PatchError::TypeMismatch {
                index: slot.index,
                expected: slot.ty,
                actual: params
                    .get(slot.index)
                    .map_or(slot.ty, Parameter::param_type),
            }),
        },
        Operand::Literal(value) => Ok(value.as_u64().map_or(0, |n| n as usize)),
    }
}

fn build_record(assignments: &[Assignment], params: &[Parameter]) -> Record {
    let mut record = Record::new();
    for Assignment { key, value } in assignments {
        let value = operand_value(value, params);
        if key == WHOLE_RECORD {
            if let Value::Object(whole) = value {
                record.extend(whole);
            }
        } else {
            record.insert(key.clone(), value);
        }
    }
    record
}
