//! Customer repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use pos_shared::{PageResult, Pagination};

use crate::domain::Customer;
use crate::error::DomainError;

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn list(
        &self,
        tenant_id: &Uuid,
        search: Option<String>,
        page: Pagination,
    ) -> Result<PageResult<Customer>, DomainError>;
    async fn find_by_id(&self, tenant_id: &Uuid, id: &Uuid) -> Result<Option<Customer>, DomainError>;
    async fn create(&self, customer: &Customer) -> Result<Customer, DomainError>;
}
