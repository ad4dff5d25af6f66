// ============================================================================
// POS Core - Subscription Plan Entity
// File: crates/pos-core/src/domain/subscription_plan.rs
// Description: Plan limits applied to tenants
// ============================================================================

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;

static PLAN_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_-]{2,30}$").expect("valid regex"));

/// Subscription plan entity
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubscriptionPlan {
    pub id: Uuid,

    pub code: String,

    #[validate(length(min = 2, max = 100, message = "Plan name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(range(min = 1, max = 10000, message = "Max branches must be between 1 and 10000"))]
    pub max_branches: i32,

    #[validate(range(min = 1, max = 10000, message = "Max users must be between 1 and 10000"))]
    pub max_users: i32,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub monthly_price_cents: i64,

    pub is_active: bool,

    // Audit fields
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl SubscriptionPlan {
    pub fn new(
        code: String,
        name: String,
        max_branches: i32,
        max_users: i32,
        monthly_price_cents: i64,
    ) -> Result<Self, DomainError> {
        let plan = Self {
            id: Uuid::new_v4(),
            code: code.trim().to_lowercase(),
            name: name.trim().to_string(),
            max_branches,
            max_users,
            monthly_price_cents,
            is_active: true,
            created_at: Utc::now(),
            modified_at: None,
        };

        plan.check()?;
        Ok(plan)
    }

    /// Field validation plus the code format.
    pub fn check(&self) -> Result<(), DomainError> {
        self.validate()?;
        if !PLAN_CODE.is_match(&self.code) {
            return Err(DomainError::ValidationError(
                "Plan code must be 2-30 characters of a-z, 0-9, '-' or '_'".to_string(),
            ));
        }
        Ok(())
    }

    pub fn allows_users(&self, count: i64) -> bool {
        count <= self.max_users as i64
    }

    pub fn allows_branches(&self, count: i64) -> bool {
        count <= self.max_branches as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_plan() {
        let plan = SubscriptionPlan::new("Basic".into(), "Basic".into(), 3, 10, 150_000).unwrap();
        assert_eq!(plan.code, "basic");
        assert!(plan.allows_users(10));
        assert!(!plan.allows_users(11));
        assert!(plan.allows_branches(3));
        assert!(!plan.allows_branches(4));
    }

    #[test]
    fn test_rejects_bad_code_and_limits() {
        assert!(SubscriptionPlan::new("has space".into(), "X plan".into(), 1, 1, 0).is_err());
        assert!(SubscriptionPlan::new("pro".into(), "Pro".into(), 0, 1, 0).is_err());
        assert!(SubscriptionPlan::new("pro".into(), "Pro".into(), 1, 1, -1).is_err());
    }
}
