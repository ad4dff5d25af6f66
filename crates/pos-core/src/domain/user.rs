// ============================================================================
// POS Core - Tenant User Entity
// File: crates/pos-core/src/domain/user.rs
// Description: Tenant-scoped user with role and home branch
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;

/// Role of a user inside their tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Owner,
    Manager,
    Cashier,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Owner, UserRole::Manager, UserRole::Cashier];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "owner",
            UserRole::Manager => "manager",
            UserRole::Cashier => "cashier",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Some(UserRole::Owner),
            "manager" => Some(UserRole::Manager),
            "cashier" => Some(UserRole::Cashier),
            _ => None,
        }
    }

    /// Create, ship and cancel transfers.
    pub fn can_manage_stockflow(&self) -> bool {
        matches!(self, UserRole::Owner | UserRole::Manager)
    }

    /// Receive transfers addressed to any branch, not only the user's own.
    pub fn can_receive_anywhere(&self) -> bool {
        matches!(self, UserRole::Owner | UserRole::Manager)
    }

    pub fn can_manage_loyalty(&self) -> bool {
        matches!(self, UserRole::Owner | UserRole::Manager)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Cashier
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub branch_id: Option<Uuid>,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 2, max = 100, message = "Display name must be between 2 and 100 characters"))]
    pub display_name: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,

    // Audit fields
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
    pub removed_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        tenant_id: Uuid,
        branch_id: Option<Uuid>,
        email: String,
        display_name: String,
        password_hash: String,
        role: UserRole,
        created_by: Option<Uuid>,
    ) -> Result<Self, DomainError> {
        let user = Self {
            id: Uuid::new_v4(),
            tenant_id,
            branch_id,
            email: email.trim().to_lowercase(),
            display_name: display_name.trim().to_string(),
            password_hash,
            role,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            created_by,
            modified_at: None,
            modified_by: None,
            removed_at: None,
        };

        user.validate()?;
        Ok(user)
    }

    pub fn is_deleted(&self) -> bool {
        self.removed_at.is_some()
    }

    pub fn can_login(&self) -> bool {
        self.is_active && !self.is_deleted()
    }

    pub fn record_login(&mut self) {
        self.last_login_at = Some(Utc::now());
    }

    pub fn update_profile(
        &mut self,
        display_name: String,
        role: UserRole,
        branch_id: Option<Uuid>,
        modified_by: Uuid,
    ) -> Result<(), DomainError> {
        self.display_name = display_name.trim().to_string();
        self.role = role;
        self.branch_id = branch_id;
        self.touch(modified_by);
        self.validate()?;
        Ok(())
    }

    pub fn set_active(&mut self, active: bool, modified_by: Uuid) {
        self.is_active = active;
        self.touch(modified_by);
    }

    pub fn set_password_hash(&mut self, password_hash: String, modified_by: Option<Uuid>) {
        self.password_hash = password_hash;
        self.modified_at = Some(Utc::now());
        self.modified_by = modified_by.or(self.modified_by);
    }

    fn touch(&mut self, modified_by: Uuid) {
        self.modified_at = Some(Utc::now());
        self.modified_by = Some(modified_by);
    }
}
