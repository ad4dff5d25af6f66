//! Product and stock repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::{Product, StockLevel};
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_by_tenant(&self, tenant_id: &Uuid) -> Result<Vec<Product>, DomainError>;
    /// Products of `tenant_id` among `ids`; ids of other tenants are silently absent.
    async fn find_many(&self, tenant_id: &Uuid, ids: &[Uuid]) -> Result<Vec<Product>, DomainError>;
    async fn stock_by_branch(&self, tenant_id: &Uuid, branch_id: &Uuid) -> Result<Vec<StockLevel>, DomainError>;
}
