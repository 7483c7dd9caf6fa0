//! Per-principal read filtering.
//!
//! Every read passes through [`AuthorizationFilter`]: the descriptor's
//! metadata factory derives which agent/VM the call targets from the actual
//! parameters, each [`StatementFilter`] turns that plus the principal's
//! grants into a [`FilterResult`], and the combined decision is applied to
//! the bound query by conjoining an expression or short-circuiting to an
//! empty result.

use crate::statement::PreparedStatementHolder;
use gatehouse_core::principal::{GrantScope, Grants};
use gatehouse_core::{
    AGENT_ID_KEY, Category, Expression, FilterResult, Parameter, Principal, Query, VM_ID_KEY,
};
use tracing::debug;

/// Runtime facts about one execution of a descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DescriptorMetadata {
    pub agent_id: Option<String>,
    pub vm_id: Option<String>,
}

/// Derives [`DescriptorMetadata`] from the parameters of a call.
pub trait DescriptorMetadataFactory: Send + Sync {
    fn metadata(&self, params: &[Parameter]) -> DescriptorMetadata;
}

/// Reads agent and VM ids from fixed parameter positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParamIndexMetadata {
    pub agent_id_param: Option<usize>,
    pub vm_id_param: Option<usize>,
}

impl DescriptorMetadataFactory for ParamIndexMetadata {
    fn metadata(&self, params: &[Parameter]) -> DescriptorMetadata {
        let string_at = |index: Option<usize>| {
            index
                .and_then(|i| params.get(i))
                .and_then(Parameter::as_str)
                .map(str::to_string)
        };
        DescriptorMetadata {
            agent_id: string_at(self.agent_id_param),
            vm_id: string_at(self.vm_id_param),
        }
    }
}

/// One dimension of read policy.
pub trait StatementFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the filter has anything to say about this category.
    fn applies_to(&self, category: &Category) -> bool;

    fn filter(&self, principal: &Principal, metadata: &DescriptorMetadata) -> FilterResult;
}

/// Decision shared by the id-based filters.
fn id_filter(key: &str, grants: Grants, requested: Option<&str>) -> FilterResult {
    match (grants, requested) {
        (Grants::All, _) => FilterResult::All,
        (grants, Some(id)) if grants.allows(id) => FilterResult::All,
        (_, Some(_)) => FilterResult::Empty,
        (Grants::Only(ids), None) if ids.is_empty() => FilterResult::Empty,
        (Grants::Only(ids), None) => {
            FilterResult::QueryExpression(Expression::in_values(key, ids))
        }
    }
}

/// Restricts reads to agents the principal may see.
#[derive(Clone, Copy, Debug, Default)]
pub struct AgentIdFilter;

impl StatementFilter for AgentIdFilter {
    fn name(&self) -> &'static str {
        "agent-id"
    }

    fn applies_to(&self, category: &Category) -> bool {
        category.has_key(AGENT_ID_KEY)
    }

    fn filter(&self, principal: &Principal, metadata: &DescriptorMetadata) -> FilterResult {
        id_filter(
            AGENT_ID_KEY,
            principal.grants(GrantScope::AgentsRead),
            metadata.agent_id.as_deref(),
        )
    }
}

/// Restricts reads to VMs the principal may see.
#[derive(Clone, Copy, Debug, Default)]
pub struct VmIdFilter;

impl StatementFilter for VmIdFilter {
    fn name(&self) -> &'static str {
        "vm-id"
    }

    fn applies_to(&self, category: &Category) -> bool {
        category.has_key(VM_ID_KEY)
    }

    /// VM scoping is opt-in: a principal without any `vms-read-*` grant is
    /// only held back when the call names a VM.
    fn filter(&self, principal: &Principal, metadata: &DescriptorMetadata) -> FilterResult {
        match (
            principal.grants(GrantScope::VmsRead),
            metadata.vm_id.as_deref(),
        ) {
            (Grants::Only(ids), None) if ids.is_empty() => FilterResult::All,
            (grants, requested) => id_filter(VM_ID_KEY, grants, requested),
        }
    }
}

/// A query after authorization.
#[derive(Clone, Debug, PartialEq)]
pub enum FilteredQuery {
    Run(Query),
    /// Yields no records without consulting storage.
    Empty,
}

pub struct AuthorizationFilter {
    filters: Vec<Box<dyn StatementFilter>>,
}

impl Default for AuthorizationFilter {
    fn default() -> Self {
        Self::new(vec![Box::new(AgentIdFilter), Box::new(VmIdFilter)])
    }
}

impl AuthorizationFilter {
    pub fn new(filters: Vec<Box<dyn StatementFilter>>) -> Self {
        Self { filters }
    }

    /// Decide how a read of `holder` with `params` is filtered for `principal`.
    pub fn decide(
        &self,
        principal: &Principal,
        holder: &PreparedStatementHolder,
        params: &[Parameter],
    ) -> FilterResult {
        let metadata = holder.metadata.metadata(params);
        self.filters
            .iter()
            .filter(|f| f.applies_to(&holder.category))
            .map(|f| {
                let result = f.filter(principal, &metadata);
                debug!(
                    filter = f.name(),
                    principal = %principal.name,
                    outcome = result.outcome(),
                    "filter evaluated"
                );
                result
            })
            .fold(FilterResult::All, FilterResult::combine)
    }

    /// Apply a decision: `F` joins an existing where clause `W` as `F AND W`.
    pub fn apply(result: FilterResult, mut query: Query) -> FilteredQuery {
        match result {
            FilterResult::All => FilteredQuery::Run(query),
            FilterResult::Empty => FilteredQuery::Empty,
            FilterResult::QueryExpression(expr) => {
                query.where_expr = Some(match query.where_expr.take() {
                    Some(existing) => expr.and(existing),
                    None => expr,
                });
                FilteredQuery::Run(query)
            }
        }
    }
}
