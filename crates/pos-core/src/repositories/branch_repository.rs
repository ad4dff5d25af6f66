//! Branch repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::Branch;
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Branch>, DomainError>;
    async fn find_by_code(&self, tenant_id: &Uuid, code: &str) -> Result<Option<Branch>, DomainError>;
    async fn list_by_tenant(&self, tenant_id: &Uuid) -> Result<Vec<Branch>, DomainError>;
    async fn count_by_tenant(&self, tenant_id: &Uuid) -> Result<i64, DomainError>;
    async fn create(&self, branch: &Branch) -> Result<Branch, DomainError>;
    async fn update(&self, branch: &Branch) -> Result<Branch, DomainError>;
}
