//! Loyalty repository trait (port)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use pos_shared::{PageResult, Pagination};

use crate::domain::{EntryType, LoyaltyEntry, LoyaltyProgram};
use crate::error::DomainError;

/// Ledger line joined with customer and author names.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerLine {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub entry_type: EntryType,
    pub stamps: i32,
    pub note: Option<String>,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberBalance {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub balance: i64,
    pub last_activity_at: DateTime<Utc>,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait LoyaltyRepository: Send + Sync {
    async fn list_programs(&self, tenant_id: &Uuid) -> Result<Vec<LoyaltyProgram>, DomainError>;
    async fn find_program(&self, tenant_id: &Uuid, id: &Uuid) -> Result<Option<LoyaltyProgram>, DomainError>;
    async fn create_program(&self, program: &LoyaltyProgram) -> Result<LoyaltyProgram, DomainError>;
    async fn update_program(&self, program: &LoyaltyProgram) -> Result<LoyaltyProgram, DomainError>;

    async fn balance(&self, program_id: &Uuid, customer_id: &Uuid) -> Result<i64, DomainError>;

    /// Appends the entry unless it would take the balance below zero, under a
    /// per-card lock. Returns the new balance.
    async fn append_entry(&self, entry: &LoyaltyEntry) -> Result<i64, DomainError>;

    async fn ledger(&self, program_id: &Uuid, page: Pagination) -> Result<PageResult<LedgerLine>, DomainError>;
    async fn members(&self, program_id: &Uuid) -> Result<Vec<MemberBalance>, DomainError>;
}
