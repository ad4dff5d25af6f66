//! Subscription plan repository trait (port)

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;
use crate::domain::SubscriptionPlan;
use crate::error::DomainError;

/// Highest usage among the live tenants on one plan.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PlanUsage {
    pub max_active_users: i64,
    pub max_active_branches: i64,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn list(&self, include_inactive: bool) -> Result<Vec<SubscriptionPlan>, DomainError>;
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<SubscriptionPlan>, DomainError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<SubscriptionPlan>, DomainError>;
    async fn create(&self, plan: &SubscriptionPlan) -> Result<SubscriptionPlan, DomainError>;
    async fn update(&self, plan: &SubscriptionPlan) -> Result<SubscriptionPlan, DomainError>;
    async fn peak_usage(&self, plan_id: &Uuid) -> Result<PlanUsage, DomainError>;
}
