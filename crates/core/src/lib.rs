//! Core domain types and shared logic for the gatehouse storage gateway.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Category schemas and typed statement parameters
//! - The statement descriptor language and its compiler
//! - Bound queries and data-modifying statements
//! - Principals, roles and authorization filter decisions
//! - Wire request/response bodies and configuration

pub mod category;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod expression;
pub mod filter;
pub mod operation;
pub mod param;
pub mod principal;
pub mod statement;
pub mod wire;

pub use category::{AGENT_ID_KEY, Category, DataType, Key, VM_ID_KEY};
pub use descriptor::{StatementKind, StatementTemplate};
pub use error::{Error, Result};
pub use expression::Expression;
pub use filter::FilterResult;
pub use operation::Operation;
pub use param::{ParamType, Parameter, Record};
pub use principal::{GrantScope, Grants, Principal, Role};
pub use statement::{ExecutableStatement, Query, WriteStatement};
