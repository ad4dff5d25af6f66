use uuid::Uuid;

use super::UserRole;

/// The signed-in tenant user a tenant-scoped operation runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantActor {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub role: UserRole,
}

impl TenantActor {
    pub fn new(user_id: Uuid, tenant_id: Uuid, branch_id: Option<Uuid>, role: UserRole) -> Self {
        Self { user_id, tenant_id, branch_id, role }
    }
}
