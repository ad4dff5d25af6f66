//! User repository trait (port)

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use pos_shared::{PageResult, Pagination};

use crate::domain::{User, UserRole};
use crate::error::DomainError;

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub tenant_id: Option<Uuid>,
    pub role: Option<UserRole>,
    /// Matches email or display name, case-insensitive.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user: User,
    pub tenant_name: String,
    pub branch_name: Option<String>,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, DomainError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError>;
    async fn list(&self, filter: &UserFilter, page: Pagination) -> Result<PageResult<UserSummary>, DomainError>;
    async fn count_active_by_tenant(&self, tenant_id: &Uuid) -> Result<i64, DomainError>;
    async fn create(&self, user: &User) -> Result<User, DomainError>;
    async fn update(&self, user: &User) -> Result<User, DomainError>;
}
