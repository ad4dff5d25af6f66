//! Super admin domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;

/// Platform operator account. Not scoped to any tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SuperAdmin {
    pub id: Uuid,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 2, max = 100))]
    pub display_name: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SuperAdmin {
    pub fn new(email: String, display_name: String, password_hash: String) -> Result<Self, DomainError> {
        let admin = Self {
            id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            display_name: display_name.trim().to_string(),
            password_hash,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
        };
        admin.validate()?;
        Ok(admin)
    }

    pub fn can_login(&self) -> bool {
        self.is_active
    }

    pub fn record_login(&mut self) {
        self.last_login_at = Some(Utc::now());
    }
}
