use async_trait::async_trait;

use super::principal::Role;
use crate::storage::StoreError;

/// Resolve a principal's role. `Ok(None)` means the principal is unknown.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn role_of(&self, principal_id: &str) -> Result<Option<Role>, StoreError>;
}

/// The roles permitted on a route.
#[derive(Debug, Clone, Copy)]
pub struct RoleSet(pub &'static [Role]);

impl RoleSet {
    pub fn permits(&self, role: Role) -> bool { self.0.contains(&role) }
}
