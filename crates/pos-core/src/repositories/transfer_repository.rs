//! Stock transfer repository trait (port)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use pos_shared::{PageResult, Pagination};

use crate::domain::{StockEffect, StockTransfer, TransferStatus};
use crate::error::DomainError;

#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    /// Transfers leaving or arriving at this branch.
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferSummary {
    pub id: Uuid,
    pub reference: String,
    pub status: TransferStatus,
    pub from_branch_id: Uuid,
    pub from_branch_name: String,
    pub to_branch_id: Uuid,
    pub to_branch_name: String,
    pub item_count: i64,
    pub total_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub created_by_name: String,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn list(
        &self,
        tenant_id: &Uuid,
        filter: &TransferFilter,
        page: Pagination,
    ) -> Result<PageResult<TransferSummary>, DomainError>;

    /// Scoped to the tenant: another tenant's transfer is `None`.
    async fn find_by_id(&self, tenant_id: &Uuid, id: &Uuid) -> Result<Option<StockTransfer>, DomainError>;

    async fn create(&self, transfer: &StockTransfer) -> Result<StockTransfer, DomainError>;

    /// Persists a transition atomically: the row is updated only while it is
    /// still in `from_status`, and every stock effect is applied in the same
    /// transaction. A negative effect that would take stock below zero fails
    /// with `InsufficientStock`; a lost race fails with `InvalidTransition`.
    async fn apply_transition(
        &self,
        transfer: &StockTransfer,
        from_status: TransferStatus,
        effects: &[StockEffect],
    ) -> Result<StockTransfer, DomainError>;
}
