// Authorization collaborator consulted before a tool is exposed

use crate::context::{Actor, TenantId};
use anyhow::Result;

/// The action an actor wants to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTarget<'a> {
    pub domain: &'a str,
    pub entity: &'a str,
    pub action: &'a str,
}

/// Capability check for actions
#[async_trait::async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether `actor` could possibly perform the action, judged with an
    /// empty input. Errors are treated as a denial by callers.
    async fn can_perform(
        &self,
        actor: Option<&Actor>,
        target: ActionTarget<'_>,
        tenant: Option<&TenantId>,
    ) -> Result<bool>;
}

/// Authorizer that permits everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait::async_trait]
impl Authorizer for AllowAll {
    async fn can_perform(
        &self,
        _actor: Option<&Actor>,
        _target: ActionTarget<'_>,
        _tenant: Option<&TenantId>,
    ) -> Result<bool> {
        Ok(true)
    }
}
