//! Identity/authorization collaborator interface.
//!
//! Who owns or staffs a space is somebody else's data; the lifecycle service
//! only ever asks the narrow question "does this user hold this role for
//! this space". Host applications supply the real implementation.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::Result;

/// Roles that gate owner/staff booking transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpaceRole {
    Owner,
    Staff,
}

/// Role lookup against the host application's identity data.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn has_role(&self, user_id: Uuid, space_id: Uuid, role: SpaceRole) -> Result<bool>;

    /// Convenience: owner or staff, the gate most transitions share.
    async fn is_owner_or_staff(&self, user_id: Uuid, space_id: Uuid) -> Result<bool> {
        Ok(self.has_role(user_id, space_id, SpaceRole::Owner).await?
            || self.has_role(user_id, space_id, SpaceRole::Staff).await?)
    }
}

/// In-memory role table for tests and single-tenant embeddings.
#[derive(Debug, Default)]
pub struct StaticAuthorizer {
    grants: HashSet<(Uuid, Uuid, SpaceRole)>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, user_id: Uuid, space_id: Uuid, role: SpaceRole) -> Self {
        self.grants.insert((user_id, space_id, role));
        self
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn has_role(&self, user_id: Uuid, space_id: Uuid, role: SpaceRole) -> Result<bool> {
        Ok(self.grants.contains(&(user_id, space_id, role)))
    }
}
