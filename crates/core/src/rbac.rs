use crate::context::{Actor, TenantId};
use crate::policy::{ActionTarget, Authorizer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

pub const WILDCARD: &str = "*";

/// Role assumed by requests that carry no actor
pub const ANONYMOUS_ROLE: &str = "anonymous";

/// Permission to perform an action on an entity, `*` matching anything
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub entity: String,
    pub action: String,
}

impl Permission {
    pub fn new(entity: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            action: action.into(),
        }
    }

    pub fn all() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    /// Check if this permission grants `entity.action`
    pub fn matches(&self, entity: &str, action: &str) -> bool {
        let entity_match = self.entity == WILDCARD || self.entity == entity;
        let action_match = self.action == WILDCARD || self.action == action;
        entity_match && action_match
    }
}

/// RBAC role with permissions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RbacRole {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: HashSet<Permission>,
}

impl RbacRole {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            permissions: HashSet::new(),
        }
    }

    pub fn add_permission(&mut self, permission: Permission) {
        self.permissions.insert(permission);
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.add_permission(permission);
        self
    }

    pub fn grants(&self, entity: &str, action: &str) -> bool {
        self.permissions.iter().any(|p| p.matches(entity, action))
    }
}

/// Role-based authorizer: an actor may perform an action when any of its
/// roles grants it. Requests without an actor use the `anonymous` role.
#[derive(Clone, Default)]
pub struct RbacAuthorizer {
    roles: Arc<RwLock<HashMap<String, RbacRole>>>,
}

impl RbacAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a role
    pub fn register_role(&self, role: RbacRole) -> anyhow::Result<()> {
        let mut roles = self
            .roles
            .write()
            .map_err(|_| anyhow::anyhow!("role table lock poisoned"))?;

        if roles.contains_key(&role.id) {
            return Err(anyhow::anyhow!("Role already exists: {}", role.id));
        }

        roles.insert(role.id.clone(), role);
        Ok(())
    }

    /// Get a role
    pub fn get_role(&self, role_id: &str) -> Option<RbacRole> {
        self.roles.read().ok()?.get(role_id).cloned()
    }

    pub fn list_roles(&self) -> Vec<RbacRole> {
        self.roles
            .read()
            .map(|roles| roles.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if the actor holds a role granting `entity.action`
    pub fn check_permission(
        &self,
        actor: Option<&Actor>,
        entity: &str,
        action: &str,
    ) -> anyhow::Result<bool> {
        let roles = self
            .roles
            .read()
            .map_err(|_| anyhow::anyhow!("role table lock poisoned"))?;

        let anonymous = [ANONYMOUS_ROLE.to_string()];
        let actor_roles = match actor {
            Some(actor) => actor.roles.as_slice(),
            None => &anonymous[..],
        };

        Ok(actor_roles
            .iter()
            .filter_map(|id| roles.get(id))
            .any(|role| role.grants(entity, action)))
    }
}

#[async_trait::async_trait]
impl Authorizer for RbacAuthorizer {
    async fn can_perform(
        &self,
        actor: Option<&Actor>,
        target: ActionTarget<'_>,
        _tenant: Option<&TenantId>,
    ) -> anyhow::Result<bool> {
        self.check_permission(actor, target.entity, target.action)
    }
}
