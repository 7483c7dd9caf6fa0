//! Typed statement parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A stored record: a JSON object keyed by category key names.
pub type Record = Map<String, Value>;

/// Declared type of a free parameter in a statement template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    Str,
    Int,
    Long,
    Bool,
    Double,
    /// A whole record (JSON object).
    Pojo,
    StrList,
    IntList,
    LongList,
    BoolList,
    DoubleList,
}

impl ParamType {
    /// Resolve a descriptor marker (`?s`, `?i[`, ...) into a type.
    pub fn from_marker(marker: char, list: bool) -> Option<Self> {
        let ty = match (marker, list) {
            ('s', false) => Self::Str,
            ('i', false) => Self::Int,
            ('l', false) => Self::Long,
            ('b', false) => Self::Bool,
            ('d', false) => Self::Double,
            ('p', false) => Self::Pojo,
            ('s', true) => Self::StrList,
            ('i', true) => Self::IntList,
            ('l', true) => Self::LongList,
            ('b', true) => Self::BoolList,
            ('d', true) => Self::DoubleList,
            _ => return None,
        };
        Some(ty)
    }

    /// The descriptor marker for this type.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Str => "?s",
            Self::Int => "?i",
            Self::Long => "?l",
            Self::Bool => "?b",
            Self::Double => "?d",
            Self::Pojo => "?p",
            Self::StrList => "?s[",
            Self::IntList => "?i[",
            Self::LongList => "?l[",
            Self::BoolList => "?b[",
            Self::DoubleList => "?d[",
        }
    }

    /// Whether this is one of the list types.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Self::StrList | Self::IntList | Self::LongList | Self::BoolList | Self::DoubleList
        )
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// A concrete parameter value supplied by a client at execution time.
///
/// On the wire this is `{"type": "string", "value": "agent-1"}`; the type tag
/// must agree with the template's declared parameter type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Parameter {
    #[serde(rename = "string")]
    Str(String),
    #[serde(rename = "int")]
    Int(i32),
    #[serde(rename = "long")]
    Long(i64),
    #[serde(rename = "boolean")]
    Bool(bool),
    #[serde(rename = "double")]
    Double(f64),
    #[serde(rename = "pojo")]
    Pojo(Record),
    #[serde(rename = "string[]")]
    StrList(Vec<String>),
    #[serde(rename = "int[]")]
    IntList(Vec<i32>),
    #[serde(rename = "long[]")]
    LongList(Vec<i64>),
    #[serde(rename = "boolean[]")]
    BoolList(Vec<bool>),
    #[serde(rename = "double[]")]
    DoubleList(Vec<f64>),
}

impl Parameter {
    /// The declared type this value satisfies.
    pub fn param_type(&self) -> ParamType {
        match self {
            Self::Str(_) => ParamType::Str,
            Self::Int(_) => ParamType::Int,
            Self::Long(_) => ParamType::Long,
            Self::Bool(_) => ParamType::Bool,
            Self::Double(_) => ParamType::Double,
            Self::Pojo(_) => ParamType::Pojo,
            Self::StrList(_) => ParamType::StrList,
            Self::IntList(_) => ParamType::IntList,
            Self::LongList(_) => ParamType::LongList,
            Self::BoolList(_) => ParamType::BoolList,
            Self::DoubleList(_) => ParamType::DoubleList,
        }
    }

    /// Borrow the string payload, if this is a string parameter.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert into the JSON value bound into expressions and records.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Str(s) => Value::from(s.as_str()),
            Self::Int(i) => Value::from(*i),
            Self::Long(l) => Value::from(*l),
            Self::Bool(b) => Value::from(*b),
            Self::Double(d) => Value::from(*d),
            Self::Pojo(record) => Value::Object(record.clone()),
            Self::StrList(items) => Value::from(items.clone()),
            Self::IntList(items) => Value::from(items.clone()),
            Self::LongList(items) => Value::from(items.clone()),
            Self::BoolList(items) => Value::from(items.clone()),
            Self::DoubleList(items) => Value::from(items.clone()),
        }
    }
}
