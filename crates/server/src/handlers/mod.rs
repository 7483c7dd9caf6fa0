//! HTTP request handlers.

pub mod admin;
pub mod auth;
pub mod common;
pub mod files;
pub mod statements;
pub mod tokens;

pub use admin::*;
pub use auth::*;
pub use common::*;
pub use files::*;
pub use statements::*;
pub use tokens::*;
