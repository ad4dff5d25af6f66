//! Tenant repository trait (port)

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use pos_shared::{PageResult, Pagination};

use crate::domain::{Tenant, User};
use crate::error::DomainError;

#[derive(Debug, Clone, Default)]
pub struct TenantFilter {
    /// Matches name or slug, case-insensitive.
    pub search: Option<String>,
    pub active: Option<bool>,
}

/// Tenant list row for the super-admin screens.
#[derive(Debug, Clone, Serialize)]
pub struct TenantSummary {
    pub tenant: Tenant,
    pub plan_code: String,
    pub plan_name: String,
    pub user_count: i64,
    pub branch_count: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlatformCounts {
    pub tenants: i64,
    pub active_tenants: i64,
    pub users: i64,
    pub branches: i64,
    pub open_transfers: i64,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DomainError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DomainError>;
    async fn list(&self, filter: &TenantFilter, page: Pagination) -> Result<PageResult<TenantSummary>, DomainError>;
    /// Inserts the tenant and its first owner in one transaction.
    async fn create_with_owner(&self, tenant: &Tenant, owner: &User) -> Result<Tenant, DomainError>;
    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError>;
    async fn platform_counts(&self) -> Result<PlatformCounts, DomainError>;
}
