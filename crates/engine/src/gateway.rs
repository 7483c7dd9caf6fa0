//! The gateway facade: everything an operation handler needs, behind one
//! handle.

use crate::authz::{AuthorizationFilter, FilteredQuery};
use crate::category::{CategoryRegistry, Registered};
use crate::error::{EngineError, Result};
use crate::patch::patch;
use crate::statement::{Prepared, StatementDescriptor, StatementRegistry, TrustedDescriptors};
use crate::token::TokenManager;
use bytes::Bytes;
use gatehouse_core::config::TrustConfig;
use gatehouse_core::descriptor::StatementKind;
use gatehouse_core::principal::GrantScope;
use gatehouse_core::{Category, DataType, ExecutableStatement, Parameter, Principal, Record, Role};
use gatehouse_storage::Storage;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Key of the single field in an aggregate-count result record.
pub const COUNT_FIELD: &str = "count";

/// Records produced by a read, with the filter decision that shaped them.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOutput {
    pub kind: StatementKind,
    pub records: Vec<Record>,
    pub filter_outcome: &'static str,
}

/// Effect of a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriteOutput {
    pub kind: StatementKind,
    /// Records added, replaced, updated or removed.
    pub count: u64,
}

pub struct Gateway {
    storage: Arc<dyn Storage>,
    categories: Arc<CategoryRegistry>,
    statements: StatementRegistry,
    authz: AuthorizationFilter,
    tokens: Arc<TokenManager>,
}

impl Gateway {
    /// Assemble a gateway from its trust configuration.
    pub fn new(storage: Arc<dyn Storage>, trust: &TrustConfig, token_timeout: Duration) -> Self {
        let categories = Arc::new(CategoryRegistry::new(
            storage.clone(),
            trust.categories.iter().cloned(),
        ));
        let statements = StatementRegistry::new(
            categories.clone(),
            TrustedDescriptors::from_config(&trust.descriptors),
        );
        Self::from_parts(
            storage,
            categories,
            statements,
            AuthorizationFilter::default(),
            Arc::new(TokenManager::new(token_timeout)),
        )
    }

    pub fn from_parts(
        storage: Arc<dyn Storage>,
        categories: Arc<CategoryRegistry>,
        statements: StatementRegistry,
        authz: AuthorizationFilter,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            storage,
            categories,
            statements,
            authz,
            tokens,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    pub fn statements(&self) -> &StatementRegistry {
        &self.statements
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub async fn register_category(
        &self,
        name: &str,
        data_type: DataType,
        category: Category,
    ) -> Result<Registered> {
        self.categories.register(name, data_type, category).await
    }

    pub fn prepare(&self, category_id: u32, text: &str) -> Result<Prepared> {
        self.statements
            .prepare(StatementDescriptor::new(category_id, text))
    }

    /// Execute a prepared read for `principal`.
    ///
    /// Count statements yield a single `{"count": n}` record.
    #[instrument(skip(self, principal, params), fields(principal = %principal.name))]
    pub async fn query(
        &self,
        principal: &Principal,
        statement_id: u32,
        params: &[Parameter],
    ) -> Result<QueryOutput> {
        let holder = self.statements.resolve(statement_id)?;
        let statement = patch(&holder, params)?;

        let (query, is_count) = match statement {
            ExecutableStatement::Query(query) => (query, false),
            ExecutableStatement::Count(query) => (query, true),
            ExecutableStatement::Write(_) => {
                return Err(EngineError::WrongStatementKind {
                    id: statement_id,
                    kind: "write",
                });
            }
        };

        let decision = self.authz.decide(principal, &holder, params);
        let filter_outcome = decision.outcome();
        if decision.is_empty() {
            tracing::warn!(statement_id, "read denied by authorization filter");
        }

        let records = match AuthorizationFilter::apply(decision, query) {
            FilteredQuery::Empty if is_count => vec![count_record(0)],
            FilteredQuery::Empty => Vec::new(),
            FilteredQuery::Run(query) if is_count => {
                vec![count_record(self.storage.count(&query).await?)]
            }
            FilteredQuery::Run(query) => self.storage.query(&query).await?,
        };

        debug!(statement_id, records = records.len(), filter_outcome, "query executed");
        Ok(QueryOutput {
            kind: if is_count {
                StatementKind::Count
            } else {
                StatementKind::Query
            },
            records,
            filter_outcome,
        })
    }

    /// Execute a prepared write. Writes are gated by role only.
    #[instrument(skip(self, params))]
    pub async fn write(&self, statement_id: u32, params: &[Parameter]) -> Result<WriteOutput> {
        let holder = self.statements.resolve(statement_id)?;
        let ExecutableStatement::Write(statement) = patch(&holder, params)? else {
            return Err(EngineError::WrongStatementKind {
                id: statement_id,
                kind: "read",
            });
        };

        let count = self.storage.execute(&statement).await.map_err(|e| {
            tracing::error!(statement_id, error = %e, "write failed in storage");
            EngineError::Storage(e)
        })?;
        let kind = statement.kind();
        debug!(statement_id, count, kind = kind.keyword(), "write executed");
        Ok(WriteOutput { kind, count })
    }

    /// Save a file the principal holds a write grant for.
    pub async fn save_file(&self, principal: &Principal, name: &str, data: Bytes) -> Result<()> {
        if !principal.grants(GrantScope::FilesWrite).allows(name) {
            tracing::warn!(principal = %principal.name, file = %name, "file write denied");
            return Err(EngineError::Forbidden(format!("no write grant for file '{name}'")));
        }
        self.storage.save_file(name, data).await?;
        info!(file = %name, "file saved");
        Ok(())
    }

    /// Load a file the principal holds a read grant for.
    pub async fn load_file(&self, principal: &Principal, name: &str) -> Result<Option<Bytes>> {
        if !principal.grants(GrantScope::FilesRead).allows(name) {
            tracing::warn!(principal = %principal.name, file = %name, "file read denied");
            return Err(EngineError::Forbidden(format!("no read grant for file '{name}'")));
        }
        Ok(self.storage.load_file(name).await?)
    }

    pub async fn purge(&self, agent_id: &str) -> Result<u64> {
        if agent_id.is_empty() {
            return Err(EngineError::InvalidRequest("agentId must not be empty".to_string()));
        }
        let removed = self.storage.purge(agent_id).await?;
        info!(agent_id = %agent_id, removed, "agent data purged");
        Ok(removed)
    }

    /// Issue a delegation token if the principal may grant `action`.
    pub fn generate_token(
        &self,
        principal: &Principal,
        client_token: &[u8],
        action: &str,
    ) -> Result<Vec<u8>> {
        if !principal.has_role(&Role::CmdChannelGrant(action.to_string())) {
            tracing::warn!(principal = %principal.name, action = %action, "token grant denied");
            return Err(EngineError::Forbidden(format!(
                "not allowed to grant action '{action}'"
            )));
        }
        Ok(self.tokens.generate(client_token, action))
    }

    pub fn verify_token(&self, client_token: &[u8], action: &str, token: &[u8]) -> bool {
        self.tokens.verify(client_token, action, token)
    }
}

fn count_record(count: u64) -> Record {
    let mut record = Record::new();
    record.insert(COUNT_FIELD.to_string(), Value::from(count));
    record
}
