//! Role resolution seam
//!
//! Maps an identity to its family role. Resolution may be ambiguous for
//! adult identities; the coordinator falls back to `parent` in that case,
//! which is a known misrouting risk for family-member calls and is kept
//! as-is.

use crate::errors::{Result, SessionError};
use crate::types::Role;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::warn;

/// Resolves an identity to a family role
#[async_trait]
pub trait RoleResolver: Send + Sync {
    /// Resolve the role for `identity`; `RoleAmbiguous` when the identity
    /// matches more than one role or none
    async fn resolve(&self, identity: &str) -> Result<Role>;
}

/// Resolve with the conservative parent fallback on ambiguity
pub async fn resolve_or_default(resolver: &dyn RoleResolver, identity: &str) -> Role {
    match resolver.resolve(identity).await {
        Ok(role) => role,
        Err(SessionError::RoleAmbiguous { identity }) => {
            warn!("role ambiguous for {identity}, defaulting to parent");
            Role::Parent
        }
        Err(err) => {
            warn!("role resolution failed for {identity}: {err}, defaulting to parent");
            Role::Parent
        }
    }
}

/// Table-backed resolver for tests and single-family deployments
pub struct StaticRoleResolver {
    roles: HashMap<String, Role>,
}

impl StaticRoleResolver {
    pub fn new() -> Self {
        Self {
            roles: HashMap::new(),
        }
    }

    pub fn with_role(mut self, identity: impl Into<String>, role: Role) -> Self {
        self.roles.insert(identity.into(), role);
        self
    }
}

impl Default for StaticRoleResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleResolver for StaticRoleResolver {
    async fn resolve(&self, identity: &str) -> Result<Role> {
        self.roles
            .get(identity)
            .copied()
            .ok_or_else(|| SessionError::RoleAmbiguous {
                identity: identity.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_resolves_known_identities() {
        let resolver = StaticRoleResolver::new()
            .with_role("child-1", Role::Child)
            .with_role("aunt-1", Role::FamilyMember);
        assert_eq!(resolver.resolve("child-1").await.unwrap(), Role::Child);
        assert_eq!(
            resolver.resolve("aunt-1").await.unwrap(),
            Role::FamilyMember
        );
        assert!(matches!(
            resolver.resolve("stranger").await,
            Err(SessionError::RoleAmbiguous { .. })
        ));
    }

    #[tokio::test]
    async fn ambiguous_identity_defaults_to_parent() {
        let resolver = StaticRoleResolver::new();
        assert_eq!(resolve_or_default(&resolver, "unknown").await, Role::Parent);
    }
}
