//! Request and response bodies exchanged with gateway clients.

use crate::category::{Category, DataType};
use crate::param::{Parameter, Record};
use serde::{Deserialize, Serialize};

/// `statementId` returned when the category is unknown or the descriptor is
/// not trusted.
pub const ILLEGAL_STATEMENT: i64 = -1;

/// `statementId` returned when a trusted descriptor fails to compile.
pub const DESCRIPTOR_PARSE_FAILED: i64 = -2;

/// `responseCode` values for statement execution.
pub mod response_code {
    pub const SUCCESS: i32 = 0;
    pub const ILLEGAL_PATCH: i32 = -1;
    pub const UNKNOWN_STATEMENT: i32 = -3;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCategoryRequest {
    pub name: String,
    pub data_type: DataType,
    pub category: Category,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCategoryResponse {
    pub category_id: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareStatementRequest {
    pub category_id: u32,
    pub descriptor: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareStatementResponse {
    /// Assigned id, or one of [`ILLEGAL_STATEMENT`] / [`DESCRIPTOR_PARSE_FAILED`].
    pub statement_id: i64,
    #[serde(default)]
    pub free_param_count: usize,
}

impl PrepareStatementResponse {
    pub fn prepared(statement_id: u32, free_param_count: usize) -> Self {
        Self {
            statement_id: i64::from(statement_id),
            free_param_count,
        }
    }

    pub fn rejected(code: i64) -> Self {
        Self {
            statement_id: code,
            free_param_count: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub statement_id: u32,
    #[serde(default)]
    pub params: Vec<Parameter>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub response_code: i32,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl QueryResponse {
    pub fn success(records: Vec<Record>) -> Self {
        Self {
            response_code: response_code::SUCCESS,
            records,
        }
    }

    pub fn failure(code: i32) -> Self {
        Self {
            response_code: code,
            records: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub response_code: i32,
    #[serde(default)]
    pub count: u64,
}

impl WriteResponse {
    pub fn success(count: u64) -> Self {
        Self {
            response_code: response_code::SUCCESS,
            count,
        }
    }

    pub fn failure(code: i32) -> Self {
        Self {
            response_code: code,
            count: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileQuery {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeRequest {
    pub agent_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeResponse {
    pub agent_id: String,
    pub removed: u64,
}

/// Both tokens travel base64-encoded (standard alphabet, padded).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenRequest {
    pub client_token: String,
    pub action_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTokenResponse {
    pub token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTokenRequest {
    pub client_token: String,
    pub action_name: String,
    pub token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WhoamiResponse {
    pub name: String,
    pub roles: Vec<String>,
}
