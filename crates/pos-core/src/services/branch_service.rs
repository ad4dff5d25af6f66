//! Branch management, scoped to one tenant at a time

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Branch, Tenant};
use crate::error::DomainError;
use crate::repositories::{BranchRepository, PlanRepository, TenantRepository};

#[derive(Debug, Clone)]
pub struct NewBranch {
    pub code: String,
    pub name: String,
    pub address: Option<String>,
}

pub struct BranchService {
    branches: Arc<dyn BranchRepository>,
    tenants: Arc<dyn TenantRepository>,
    plans: Arc<dyn PlanRepository>,
}

impl BranchService {
    pub fn new(
        branches: Arc<dyn BranchRepository>,
        tenants: Arc<dyn TenantRepository>,
        plans: Arc<dyn PlanRepository>,
    ) -> Self {
        Self {
            branches,
            tenants,
            plans,
        }
    }

    pub async fn list_branches(&self, tenant_id: &Uuid) -> Result<Vec<Branch>, DomainError> {
        self.branches.list_by_tenant(tenant_id).await
    }

    pub async fn create_branch(&self, tenant_id: &Uuid, input: NewBranch) -> Result<Branch, DomainError> {
        let tenant = self.load_tenant(tenant_id).await?;
        let branch = Branch::new(tenant.id, input.code, input.name, input.address)?;

        self.check_branch_limit(&tenant).await?;
        if self.branches.find_by_code(&tenant.id, &branch.code).await?.is_some() {
            warn!("Branch code {} already used in tenant {}", branch.code, tenant.slug);
            return Err(DomainError::BranchCodeAlreadyExists(branch.code));
        }

        let branch = self.branches.create(&branch).await?;
        info!("Branch {} created for tenant {}", branch.code, tenant.slug);
        Ok(branch)
    }

    pub async fn update_branch(
        &self,
        tenant_id: &Uuid,
        id: &Uuid,
        name: String,
        address: Option<String>,
    ) -> Result<Branch, DomainError> {
        let mut branch = self.load_branch(tenant_id, id).await?;
        branch.update_details(name, address)?;
        self.branches.update(&branch).await
    }

    /// `tenant_id` of `None` is the super-admin view, which may touch any branch.
    pub async fn set_branch_active(
        &self,
        tenant_id: Option<&Uuid>,
        id: &Uuid,
        active: bool,
    ) -> Result<Branch, DomainError> {
        let mut branch = match tenant_id {
            Some(tenant_id) => self.load_branch(tenant_id, id).await?,
            None => self.branches.find_by_id(id).await?.ok_or(DomainError::BranchNotFound)?,
        };

        if active && !branch.is_active {
            let tenant = self.load_tenant(&branch.tenant_id).await?;
            self.check_branch_limit(&tenant).await?;
        }

        branch.set_active(active);
        let branch = self.branches.update(&branch).await?;
        info!("Branch {} active = {}", branch.code, active);
        Ok(branch)
    }

    async fn load_tenant(&self, id: &Uuid) -> Result<Tenant, DomainError> {
        self.tenants
            .find_by_id(id)
            .await?
            .filter(|t| !t.is_deleted())
            .ok_or(DomainError::TenantNotFound)
    }

    async fn load_branch(&self, tenant_id: &Uuid, id: &Uuid) -> Result<Branch, DomainError> {
        self.branches
            .find_by_id(id)
            .await?
            .filter(|b| b.belongs_to(*tenant_id))
            .ok_or(DomainError::BranchNotFound)
    }

    async fn check_branch_limit(&self, tenant: &Tenant) -> Result<(), DomainError> {
        let plan = self
            .plans
            .find_by_id(&tenant.plan_id)
            .await?
            .ok_or_else(|| DomainError::PlanNotFound(tenant.plan_id.to_string()))?;
        let active = self.branches.count_by_tenant(&tenant.id).await?;
        if !plan.allows_branches(active + 1) {
            return Err(DomainError::LimitReached(format!(
                "plan {} allows {} branches",
                plan.code, plan.max_branches
            )));
        }
        Ok(())
    }
}
