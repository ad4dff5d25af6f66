// ============================================================================
// POS Core - Tenant Entity
// File: crates/pos-core/src/domain/tenant.rs
// Description: Tenant entity with subscription management
// ============================================================================

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use pos_shared::utils::slugify;

use crate::error::DomainError;

/// Tenant entity
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Tenant {
    pub id: Uuid,

    #[validate(length(min = 2, max = 100, message = "Tenant name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(length(min = 2, max = 100, message = "Slug must be between 2 and 100 characters"))]
    pub slug: String,

    pub plan_id: Uuid,
    pub is_active: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,

    // Audit fields
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<Uuid>,
}

impl Tenant {
    /// A blank `slug` is derived from the name.
    pub fn new(
        name: String,
        slug: Option<String>,
        plan_id: Uuid,
        subscription_expires_at: Option<DateTime<Utc>>,
        created_by: Option<Uuid>,
    ) -> Result<Self, DomainError> {
        let name = name.trim().to_string();
        let slug = match slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => slugify(s),
            _ => slugify(&name),
        };

        let tenant = Self {
            id: Uuid::new_v4(),
            name,
            slug,
            plan_id,
            is_active: true,
            subscription_expires_at,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
            removed_at: None,
            removed_by: None,
        };

        tenant.validate()?;
        Ok(tenant)
    }

    pub fn is_subscription_active(&self) -> bool {
        match self.subscription_expires_at {
            Some(expires_at) => expires_at > Utc::now(),
            None => true, // No expiration means active
        }
    }

    /// Whether users of this tenant may sign in.
    pub fn is_operational(&self) -> bool {
        self.is_active && !self.is_deleted() && self.is_subscription_active()
    }

    pub fn rename(&mut self, name: String, modified_by: Uuid) -> Result<(), DomainError> {
        self.name = name.trim().to_string();
        self.touch(modified_by);
        self.validate()?;
        Ok(())
    }

    pub fn set_active(&mut self, active: bool, modified_by: Uuid) {
        self.is_active = active;
        self.touch(modified_by);
    }

    pub fn change_plan(&mut self, plan_id: Uuid, modified_by: Uuid) {
        self.plan_id = plan_id;
        self.touch(modified_by);
    }

    /// Extends from the later of now and the current expiry.
    pub fn extend_subscription(&mut self, days: i64, modified_by: Uuid) {
        let base = match self.subscription_expires_at {
            Some(expires_at) if expires_at > Utc::now() => expires_at,
            _ => Utc::now(),
        };
        self.subscription_expires_at = Some(base + Duration::days(days));
        self.touch(modified_by);
    }

    pub fn soft_delete(&mut self, deleted_by: Uuid) {
        self.removed_at = Some(Utc::now());
        self.removed_by = Some(deleted_by);
        self.is_active = false;
    }

    pub fn is_deleted(&self) -> bool {
        self.removed_at.is_some()
    }

    fn touch(&mut self, modified_by: Uuid) {
        self.modified_at = Some(Utc::now());
        self.modified_by = Some(modified_by);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tenant_derives_slug() {
        let tenant = Tenant::new("Toko Maju Jaya".to_string(), None, Uuid::new_v4(), None, None).unwrap();
        assert_eq!(tenant.slug, "toko-maju-jaya");
        assert!(tenant.is_operational());
    }

    #[test]
    fn test_explicit_slug_is_normalized() {
        let tenant = Tenant::new("Kopi".to_string(), Some(" Kopi Pagi ".into()), Uuid::new_v4(), None, None).unwrap();
        assert_eq!(tenant.slug, "kopi-pagi");
    }

    #[test]
    fn test_rejects_short_name() {
        assert!(Tenant::new("K".to_string(), None, Uuid::new_v4(), None, None).is_err());
    }

    #[test]
    fn test_subscription_expiry() {
        let mut tenant = Tenant::new(
            "Test".to_string(),
            None,
            Uuid::new_v4(),
            Some(Utc::now() - Duration::days(1)),
            None,
        )
        .unwrap();
        assert!(!tenant.is_subscription_active());
        assert!(!tenant.is_operational());

        tenant.extend_subscription(30, Uuid::new_v4());
        assert!(tenant.is_subscription_active());
        let remaining = tenant.subscription_expires_at.unwrap() - Utc::now();
        assert!(remaining.num_days() >= 29);
    }

    #[test]
    fn test_deactivate_and_delete() {
        let mut tenant = Tenant::new("Test".to_string(), None, Uuid::new_v4(), None, None).unwrap();
        let admin = Uuid::new_v4();
        tenant.set_active(false, admin);
        assert!(!tenant.is_operational());
        assert_eq!(tenant.modified_by, Some(admin));

        tenant.soft_delete(admin);
        assert!(tenant.is_deleted());
    }
}
