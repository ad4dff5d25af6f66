//! Branch domain entity

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;

static BRANCH_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9-]{2,20}$").expect("valid regex"));

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Branch {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,

    #[validate(length(min = 2, max = 100, message = "Branch name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Address too long"))]
    pub address: Option<String>,

    pub is_active: bool,

    // Audit
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Branch {
    pub fn new(
        tenant_id: Uuid,
        code: String,
        name: String,
        address: Option<String>,
    ) -> Result<Self, DomainError> {
        let branch = Self {
            id: Uuid::new_v4(),
            tenant_id,
            code: code.trim().to_uppercase(),
            name: name.trim().to_string(),
            address: address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            is_active: true,
            created_at: Utc::now(),
            modified_at: None,
        };

        branch.check()?;
        Ok(branch)
    }

    pub fn check(&self) -> Result<(), DomainError> {
        self.validate()?;
        if !BRANCH_CODE.is_match(&self.code) {
            return Err(DomainError::ValidationError(
                "Branch code must be 2-20 characters of A-Z, 0-9 or '-'".to_string(),
            ));
        }
        Ok(())
    }

    pub fn belongs_to(&self, tenant_id: Uuid) -> bool {
        self.tenant_id == tenant_id
    }

    pub fn update_details(&mut self, name: String, address: Option<String>) -> Result<(), DomainError> {
        self.name = name.trim().to_string();
        self.address = address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
        self.modified_at = Some(Utc::now());
        self.check()
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.modified_at = Some(Utc::now());
    }
}
