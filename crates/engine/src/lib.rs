//! Protocol and state engine of the Gatehouse storage gateway.
//!
//! - [`CategoryRegistry`]: ids for registered category schemas
//! - [`StatementRegistry`]: compiles trusted descriptors once, caches them
//! - [`patch`](patch::patch): binds parameters into prepared statements
//! - [`AuthorizationFilter`]: per-principal read filtering
//! - [`TokenManager`]: delegation tokens for the command channel
//! - [`Gateway`]: the facade operation handlers call into

pub mod authz;
pub mod category;
pub mod error;
pub mod gateway;
pub mod patch;
pub mod statement;
pub mod token;

pub use authz::{
    AgentIdFilter, AuthorizationFilter, DescriptorMetadata, DescriptorMetadataFactory,
    FilteredQuery, ParamIndexMetadata, StatementFilter, VmIdFilter,
};
pub use category::{CategoryRegistry, Registered, RegisteredCategory};
pub use error::{EngineError, PatchError, Result};
pub use gateway::{Gateway, QueryOutput, WriteOutput};
pub use statement::{
    Prepared, PreparedStatementHolder, StatementDescriptor, StatementRegistry, TrustedDescriptors,
};
pub use token::TokenManager;
