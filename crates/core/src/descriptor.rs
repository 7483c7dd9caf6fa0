//! Statement descriptor language.
//!
//! A descriptor is a parameterized statement template such as
//! `QUERY host-info WHERE 'agentId' = ?s SORT 'timeStamp' DSC LIMIT 1`.
//! Free parameters (`?s`, `?i`, `?l`, `?b`, `?d`, `?p`, and the list forms
//! `?s[` ...) are numbered left to right starting at zero.
//!
//! [`compile`] turns trusted descriptor text into a [`StatementTemplate`]
//! bound to a specific category; templates are later patched with concrete
//! parameter values by the engine.

use crate::category::Category;
use crate::error::{Error, Result};
use crate::expression::{CompareOp, Expression, FreeParam, Operand};
use crate::param::ParamType;
use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{anychar, char as pchar, digit0, digit1, multispace0};
use nom::combinator::{all_consuming, cut, map, map_opt, opt, recognize, value, verify};
use nom::error::{ContextError, ErrorKind, ParseError, context};
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use serde_json::Value;
use std::borrow::Cow;

/// Assignment target meaning "the whole record" (`SET * = ?p`).
pub const WHOLE_RECORD: &str = "*";

const KEYWORDS: &[&str] = &[
    "QUERY",
    "QUERY-COUNT",
    "ADD",
    "REPLACE",
    "UPDATE",
    "REMOVE",
    "SET",
    "WHERE",
    "SORT",
    "LIMIT",
    "AND",
    "OR",
    "NOT",
    "IN",
    "ASC",
    "DSC",
    "DESC",
];

/// Statement kind, determined by the leading keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Query,
    Count,
    Add,
    Replace,
    Update,
    Remove,
}

impl StatementKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Query => "QUERY",
            Self::Count => "QUERY-COUNT",
            Self::Add => "ADD",
            Self::Replace => "REPLACE",
            Self::Update => "UPDATE",
            Self::Remove => "REMOVE",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "QUERY" => Self::Query,
            "QUERY-COUNT" => Self::Count,
            "ADD" => Self::Add,
            "REPLACE" => Self::Replace,
            "UPDATE" => Self::Update,
            "REMOVE" => Self::Remove,
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub key: String,
    pub order: SortOrder,
}

/// `key = operand` inside a SET clause.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub key: String,
    pub value: Operand,
}

/// A compiled, still-parameterized statement.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementTemplate {
    pub kind: StatementKind,
    /// Category name as written in the descriptor.
    pub category: String,
    pub where_expr: Option<Expression>,
    pub sort: Vec<SortKey>,
    pub limit: Option<Operand>,
    pub assignments: Vec<Assignment>,
    /// Declared types of the free parameters, by position.
    pub params: Vec<ParamType>,
}

impl StatementTemplate {
    pub fn free_param_count(&self) -> usize {
        self.params.len()
    }

    /// Assign parameter indices in textual order: SET, then WHERE, then LIMIT.
    fn number_params(&mut self) {
        let mut params = Vec::new();
        for assignment in &mut self.assignments {
            number_operand(&mut assignment.value, &mut params);
        }
        if let Some(expr) = &mut self.where_expr {
            number_expression(expr, &mut params);
        }
        if let Some(limit) = &mut self.limit {
            number_operand(limit, &mut params);
        }
        self.params = params;
    }

    fn referenced_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        if let Some(expr) = &self.where_expr {
            collect_keys(expr, &mut keys);
        }
        keys.extend(self.sort.iter().map(|s| s.key.as_str()));
        keys.extend(
            self.assignments
                .iter()
                .map(|a| a.key.as_str())
                .filter(|k| *k != WHOLE_RECORD),
        );
        keys
    }
}

fn collect_keys<'a>(expr: &'a Expression, out: &mut Vec<&'a str>) {
    match expr {
        Expression::Compare { key, .. } | Expression::In { key, .. } => out.push(key),
        Expression::And(l, r) | Expression::Or(l, r) => {
            collect_keys(l, out);
            collect_keys(r, out);
        }
        Expression::Not(inner) => collect_keys(inner, out),
    }
}

fn number_operand(operand: &mut Operand, params: &mut Vec<ParamType>) {
    if let Operand::Param(slot) = operand {
        slot.index = params.len();
        params.push(slot.ty);
    }
}

fn number_expression(expr: &mut Expression, params: &mut Vec<ParamType>) {
    match expr {
        Expression::Compare { operand, .. } | Expression::In { operand, .. } => {
            number_operand(operand, params)
        }
        Expression::And(l, r) | Expression::Or(l, r) => {
            number_expression(l, params);
            number_expression(r, params);
        }
        Expression::Not(inner) => number_expression(inner, params),
    }
}

/// Parse descriptor text without reference to a category.
pub fn parse(text: &str) -> Result<StatementTemplate> {
    let (_, mut template) = all_consuming(statement)(text).map_err(|e| match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            Error::parse(text.len() - e.input.len(), e.message)
        }
        nom::Err::Incomplete(_) => Error::parse(text.len(), "unexpected end of descriptor"),
    })?;
    template.number_params();
    Ok(template)
}

/// Compile descriptor text against the category it is prepared for.
///
/// Fails when the text does not parse, names a different category, uses a
/// statement kind incompatible with the category's data type, or references
/// keys the category does not declare.
pub fn compile(text: &str, category: &Category) -> Result<StatementTemplate> {
    let template = parse(text)?;

    if template.category != category.name {
        return Err(Error::CategoryMismatch(format!(
            "descriptor targets '{}' but was prepared against '{}'",
            template.category, category.name
        )));
    }

    let aggregate = category.data_type.is_aggregate();
    match (template.kind, aggregate) {
        (StatementKind::Count, false) => {
            return Err(Error::CategoryMismatch(format!(
                "{} requires an aggregate category",
                StatementKind::Count.keyword()
            )));
        }
        (kind, true) if kind != StatementKind::Count => {
            return Err(Error::CategoryMismatch(format!(
                "{} cannot run against aggregate category '{}'",
                kind.keyword(),
                category.name
            )));
        }
        _ => {}
    }

    if let Some(unknown) = template
        .referenced_keys()
        .into_iter()
        .find(|k| !category.has_key(k))
    {
        return Err(Error::CategoryMismatch(format!(
            "category '{}' has no key '{unknown}'",
            category.name
        )));
    }

    Ok(template)
}

/// Parser error carrying the remaining input, so the failure offset can be
/// recovered against the full descriptor text.
#[derive(Debug)]
struct SyntaxError<'a> {
    input: &'a str,
    message: Cow<'static, str>,
    /// Set once a specific message is attached; outer contexts keep it.
    specific: bool,
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        let message = match kind {
            ErrorKind::Eof => "unexpected trailing input",
            _ => "unexpected input",
        };
        Self {
            input,
            message: Cow::Borrowed(message),
            specific: false,
        }
    }

    fn append(_: &'a str, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> ContextError<&'a str> for SyntaxError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, other: Self) -> Self {
        if other.specific {
            return other;
        }
        Self {
            input,
            message: Cow::Borrowed(ctx),
            specific: true,
        }
    }
}

type PResult<'a, T> = IResult<&'a str, T, SyntaxError<'a>>;

fn failure(input: &str, message: impl Into<Cow<'static, str>>) -> nom::Err<SyntaxError<'_>> {
    nom::Err::Failure(SyntaxError {
        input,
        message: message.into(),
        specific: true,
    })
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Pairs a parser's output with the input it started at.
fn spanned<'a, O, F>(mut inner: F) -> impl FnMut(&'a str) -> PResult<'a, (&'a str, O)>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    move |input| {
        let (rest, out) = inner(input)?;
        Ok((rest, (input, out)))
    }
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn word(input: &str) -> PResult<'_, &str> {
    recognize(tuple((take_while1(is_word_start), take_while(is_word_char))))(input)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    verify(word, move |w: &str| w == kw)
}

fn quoted(input: &str) -> PResult<'_, &str> {
    preceded(
        pchar('\''),
        cut(context(
            "unterminated quoted string",
            terminated(take_while(|c: char| c != '\''), pchar('\'')),
        )),
    )(input)
}

/// A category name or key: bare word or non-empty quoted string.
fn name(input: &str) -> PResult<'_, String> {
    map(
        alt((
            verify(word, |w: &str| !KEYWORDS.contains(&w)),
            verify(quoted, |q: &str| !q.is_empty()),
        )),
        str::to_string,
    )(input)
}

fn number(input: &str) -> PResult<'_, Value> {
    map_opt(
        recognize(tuple((
            opt(pchar('-')),
            digit1,
            opt(pair(pchar('.'), digit0)),
        ))),
        |raw: &str| match raw.parse::<i64>() {
            Ok(int) => Some(Value::from(int)),
            Err(_) => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::from),
        },
    )(input)
}

fn param(input: &str) -> PResult<'_, ParamType> {
    let (rest, (marker, list)) = preceded(
        pchar('?'),
        cut(context(
            "dangling parameter marker",
            pair(anychar, opt(pchar('['))),
        )),
    )(input)?;
    match ParamType::from_marker(marker, list.is_some()) {
        Some(ty) => Ok((rest, ty)),
        None => Err(failure(
            input,
            format!("unknown parameter type '?{marker}'"),
        )),
    }
}

// Parameter indices are placeholders until the whole statement has parsed.
fn operand(input: &str) -> PResult<'_, Operand> {
    context(
        "expected literal or parameter",
        alt((
            map(param, |ty| Operand::Param(FreeParam { index: 0, ty })),
            map(quoted, |s| Operand::Literal(Value::String(s.to_string()))),
            map(number, Operand::Literal),
            value(Operand::Literal(Value::Bool(true)), keyword("true")),
            value(Operand::Literal(Value::Bool(false)), keyword("false")),
        )),
    )(input)
}

fn compare_op(input: &str) -> PResult<'_, CompareOp> {
    alt((
        value(CompareOp::NotEq, tag("!=")),
        value(CompareOp::LessEq, tag("<=")),
        value(CompareOp::GreaterEq, tag(">=")),
        value(CompareOp::Less, tag("<")),
        value(CompareOp::Greater, tag(">")),
        value(CompareOp::Eq, tag("=")),
    ))(input)
}

/// List and record parameters only fit `IN` and whole-record `SET`.
fn non_scalar_param(operand: &Operand) -> Option<ParamType> {
    match operand {
        Operand::Param(slot) if slot.ty.is_list() || slot.ty == ParamType::Pojo => Some(slot.ty),
        _ => None,
    }
}

fn statement_kind(input: &str) -> PResult<'_, StatementKind> {
    map_opt(word, StatementKind::from_keyword)(input)
}

fn statement(input: &str) -> PResult<'_, StatementTemplate> {
    let (rest, kind) = context("expected statement keyword", ws(statement_kind))(input)?;
    let (rest, category) = cut(context("expected category name", ws(name)))(rest)?;

    let (rest, assignments) = match kind {
        StatementKind::Add | StatementKind::Replace | StatementKind::Update => {
            let (rest, _) = cut(context("expected SET", ws(keyword("SET"))))(rest)?;
            assignments(kind, rest)?
        }
        _ => (rest, Vec::new()),
    };

    let (rest, where_expr) = match kind {
        StatementKind::Add => (rest, None),
        StatementKind::Replace | StatementKind::Update => map(
            preceded(
                cut(context("expected WHERE", ws(keyword("WHERE")))),
                cut(expression),
            ),
            Some,
        )(rest)?,
        _ => opt(preceded(ws(keyword("WHERE")), cut(expression)))(rest)?,
    };

    let (rest, sort, limit) = if kind == StatementKind::Query {
        let (rest, sort) = opt(preceded(
            ws(keyword("SORT")),
            cut(separated_list1(ws(pchar(',')), sort_key)),
        ))(rest)?;
        let (rest, limit) = opt(preceded(ws(keyword("LIMIT")), cut(limit_operand)))(rest)?;
        (rest, sort.unwrap_or_default(), limit)
    } else {
        (rest, Vec::new(), None)
    };

    Ok((
        rest,
        StatementTemplate {
            kind,
            category,
            where_expr,
            sort,
            limit,
            assignments,
            params: Vec::new(),
        },
    ))
}

fn assignments(kind: StatementKind, input: &str) -> PResult<'_, Vec<Assignment>> {
    let (rest, star) = opt(ws(pchar('*')))(input)?;
    if star.is_some() {
        if kind == StatementKind::Update {
            return Err(failure(input, "UPDATE cannot replace a whole record"));
        }
        let (after, record) = cut(preceded(
            context("expected '='", ws(pchar('='))),
            ws(operand),
        ))(rest)?;
        return match record {
            Operand::Param(FreeParam {
                ty: ParamType::Pojo,
                ..
            }) => Ok((
                after,
                vec![Assignment {
                    key: WHOLE_RECORD.to_string(),
                    value: record,
                }],
            )),
            _ => Err(failure(rest, "whole-record assignment requires ?p")),
        };
    }

    let (rest, list) = separated_list1(ws(pchar(',')), spanned(assignment))(input)?;
    let mut assignments: Vec<Assignment> = Vec::with_capacity(list.len());
    for (at, assignment) in list {
        if assignments.iter().any(|a| a.key == assignment.key) {
            return Err(failure(
                at,
                format!("key '{}' assigned twice", assignment.key),
            ));
        }
        assignments.push(assignment);
    }
    Ok((rest, assignments))
}

fn assignment(input: &str) -> PResult<'_, Assignment> {
    let (rest, key) = context("expected key", ws(name))(input)?;
    let (after, operand) = cut(preceded(
        context("expected '='", ws(pchar('='))),
        ws(operand),
    ))(rest)?;
    if let Some(ty) = non_scalar_param(&operand) {
        return Err(failure(rest, format!("cannot assign {ty} to key '{key}'")));
    }
    Ok((after, Assignment { key, value: operand }))
}

fn expression(input: &str) -> PResult<'_, Expression> {
    let (rest, first) = conjunction(input)?;
    let (rest, others) = many0(preceded(ws(keyword("OR")), cut(conjunction)))(rest)?;
    let expr = others
        .into_iter()
        .fold(first, |lhs, rhs| Expression::Or(Box::new(lhs), Box::new(rhs)));
    Ok((rest, expr))
}

fn conjunction(input: &str) -> PResult<'_, Expression> {
    let (rest, first) = unary(input)?;
    let (rest, others) = many0(preceded(ws(keyword("AND")), cut(unary)))(rest)?;
    let expr = others
        .into_iter()
        .fold(first, |lhs, rhs| Expression::And(Box::new(lhs), Box::new(rhs)));
    Ok((rest, expr))
}

fn unary(input: &str) -> PResult<'_, Expression> {
    alt((
        map(preceded(ws(keyword("NOT")), cut(unary)), |inner| {
            Expression::Not(Box::new(inner))
        }),
        preceded(
            ws(pchar('(')),
            cut(terminated(
                expression,
                context("expected ')'", ws(pchar(')'))),
            )),
        ),
        comparison,
    ))(input)
}

fn comparison(input: &str) -> PResult<'_, Expression> {
    let (rest, key) = context("expected key", ws(name))(input)?;

    let (rest, in_list) = opt(ws(keyword("IN")))(rest)?;
    if in_list.is_some() {
        let (after, operand) = cut(ws(operand))(rest)?;
        return match operand {
            Operand::Param(slot) if slot.ty.is_list() => Ok((after, Expression::In { key, operand })),
            _ => Err(failure(rest, "IN requires a list parameter")),
        };
    }

    let (rest, op) = cut(context("expected comparison operator", ws(compare_op)))(rest)?;
    let (after, operand) = cut(ws(operand))(rest)?;
    if let Some(ty) = non_scalar_param(&operand) {
        return Err(failure(rest, format!("cannot compare '{key}' against {ty}")));
    }
    Ok((after, Expression::Compare { key, op, operand }))
}

fn sort_key(input: &str) -> PResult<'_, SortKey> {
    let order = alt((
        value(SortOrder::Ascending, keyword("ASC")),
        value(SortOrder::Descending, keyword("DSC")),
        value(SortOrder::Descending, keyword("DESC")),
    ));
    map(
        pair(context("expected sort key", ws(name)), opt(ws(order))),
        |(key, order)| SortKey {
            key,
            order: order.unwrap_or(SortOrder::Ascending),
        },
    )(input)
}

fn limit_operand(input: &str) -> PResult<'_, Operand> {
    let (rest, operand) = ws(operand)(input)?;
    let valid = match &operand {
        Operand::Literal(Value::Number(n)) => n.as_u64().is_some_and(|v| v <= u32::MAX as u64),
        Operand::Param(slot) => slot.ty == ParamType::Int,
        _ => false,
    };
    if valid {
        Ok((rest, operand))
    } else {
        Err(failure(input, "LIMIT requires a non-negative integer or ?i"))
    }
}
