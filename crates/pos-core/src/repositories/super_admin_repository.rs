//! Super admin repository trait (port)

use async_trait::async_trait;
use crate::domain::SuperAdmin;
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait SuperAdminRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<SuperAdmin>, DomainError>;
    async fn create(&self, admin: &SuperAdmin) -> Result<SuperAdmin, DomainError>;
    async fn update(&self, admin: &SuperAdmin) -> Result<SuperAdmin, DomainError>;
}
