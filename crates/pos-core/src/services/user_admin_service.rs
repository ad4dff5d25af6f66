// ============================================================================
// POS Core - User Administration Service
// File: crates/pos-core/src/services/user_admin_service.rs
// ============================================================================
//! Super-admin management of tenant users across all tenants

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use pos_security::PasswordService;
use pos_shared::utils::mask_email;
use pos_shared::{PageResult, Pagination};

use crate::domain::{Tenant, User, UserRole};
use crate::error::DomainError;
use crate::repositories::{
    BranchRepository, PlanRepository, TenantRepository, UserFilter, UserRepository, UserSummary,
};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub email: String,
    pub display_name: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub display_name: String,
    pub role: UserRole,
    pub branch_id: Option<Uuid>,
}

pub struct UserAdminService {
    users: Arc<dyn UserRepository>,
    tenants: Arc<dyn TenantRepository>,
    plans: Arc<dyn PlanRepository>,
    branches: Arc<dyn BranchRepository>,
}

impl UserAdminService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tenants: Arc<dyn TenantRepository>,
        plans: Arc<dyn PlanRepository>,
        branches: Arc<dyn BranchRepository>,
    ) -> Self {
        Self {
            users,
            tenants,
            plans,
            branches,
        }
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
        page: Pagination,
    ) -> Result<PageResult<UserSummary>, DomainError> {
        self.users.list(filter, page).await
    }

    pub async fn get_user(&self, id: &Uuid) -> Result<User, DomainError> {
        self.users
            .find_by_id(id)
            .await?
            .filter(|u| !u.is_deleted())
            .ok_or(DomainError::UserNotFound)
    }

    pub async fn create_user(&self, actor_id: Uuid, input: NewUser) -> Result<User, DomainError> {
        let email = input.email.trim().to_lowercase();
        info!("Creating user {} for tenant {}", mask_email(&email), input.tenant_id);

        let tenant = self.load_tenant(&input.tenant_id).await?;
        self.check_branch(&tenant, input.branch_id).await?;
        self.check_user_limit(&tenant).await?;

        if self.users.find_by_email(&email).await?.is_some() {
            warn!("User creation failed: email already exists: {}", mask_email(&email));
            return Err(DomainError::EmailAlreadyExists(email));
        }

        PasswordService::check_strength(&input.password, &[email.as_str(), input.display_name.as_str()])?;
        let password_hash = PasswordService::hash(&input.password)?;

        let user = User::new(
            tenant.id,
            input.branch_id,
            email,
            input.display_name,
            password_hash,
            input.role,
            Some(actor_id),
        )?;

        let user = self.users.create(&user).await?;
        info!("User created: {} ({})", mask_email(&user.email), user.id);
        Ok(user)
    }

    pub async fn update_user(&self, actor_id: Uuid, id: &Uuid, input: UserUpdate) -> Result<User, DomainError> {
        let mut user = self.get_user(id).await?;
        let tenant = self.load_tenant(&user.tenant_id).await?;
        self.check_branch(&tenant, input.branch_id).await?;

        user.update_profile(input.display_name, input.role, input.branch_id, actor_id)?;
        self.users.update(&user).await
    }

    /// Reactivation counts against the plan again.
    pub async fn set_user_active(&self, actor_id: Uuid, id: &Uuid, active: bool) -> Result<User, DomainError> {
        let mut user = self.get_user(id).await?;
        if active && !user.is_active {
            let tenant = self.load_tenant(&user.tenant_id).await?;
            self.check_user_limit(&tenant).await?;
        }
        user.set_active(active, actor_id);
        let user = self.users.update(&user).await?;
        info!("User {} active = {}", mask_email(&user.email), active);
        Ok(user)
    }

    /// Replaces the password with a generated one and returns it, once.
    pub async fn reset_password(&self, actor_id: Uuid, id: &Uuid) -> Result<String, DomainError> {
        let mut user = self.get_user(id).await?;
        let temporary = PasswordService::generate_temporary();
        user.set_password_hash(PasswordService::hash(&temporary)?, Some(actor_id));
        self.users.update(&user).await?;
        warn!("Password reset for {} by {}", mask_email(&user.email), actor_id);
        Ok(temporary)
    }

    async fn load_tenant(&self, id: &Uuid) -> Result<Tenant, DomainError> {
        self.tenants
            .find_by_id(id)
            .await?
            .filter(|t| !t.is_deleted())
            .ok_or(DomainError::TenantNotFound)
    }

    async fn check_branch(&self, tenant: &Tenant, branch_id: Option<Uuid>) -> Result<(), DomainError> {
        let Some(branch_id) = branch_id else {
            return Ok(());
        };
        match self.branches.find_by_id(&branch_id).await? {
            Some(branch) if branch.belongs_to(tenant.id) => Ok(()),
            Some(_) => {
                warn!("Branch {} does not belong to tenant {}", branch_id, tenant.slug);
                Err(DomainError::CrossTenantAccess)
            }
            None => Err(DomainError::BranchNotFound),
        }
    }

    async fn check_user_limit(&self, tenant: &Tenant) -> Result<(), DomainError> {
        let plan = self
            .plans
            .find_by_id(&tenant.plan_id)
            .await?
            .ok_or_else(|| DomainError::PlanNotFound(tenant.plan_id.to_string()))?;
        let active = self.users.count_active_by_tenant(&tenant.id).await?;
        if !plan.allows_users(active + 1) {
            return Err(DomainError::LimitReached(format!(
                "plan {} allows {} active users",
                plan.code, plan.max_users
            )));
        }
        Ok(())
    }
}
