//! Customer domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Customer name is required"))]
    pub name: String,

    #[validate(length(min = 5, max = 20, message = "Phone number must be between 5 and 20 characters"))]
    pub phone: Option<String>,

    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(
        tenant_id: Uuid,
        name: String,
        phone: Option<String>,
        email: Option<String>,
    ) -> Result<Self, DomainError> {
        let customer = Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.trim().to_string(),
            phone: phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            email: email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()),
            created_at: Utc::now(),
        };
        customer.validate()?;
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::name::en::Name;
    use fake::Fake;

    #[test]
    fn test_blank_optional_fields_become_none() {
        let name: String = Name().fake();
        let customer = Customer::new(Uuid::new_v4(), name.clone(), Some(" ".into()), Some("".into())).unwrap();
        assert_eq!(customer.name, name.trim());
        assert!(customer.phone.is_none());
        assert!(customer.email.is_none());
    }

    #[test]
    fn test_invalid_email_rejected() {
        assert!(Customer::new(Uuid::new_v4(), "Budi".into(), None, Some("budi-at-mail".into())).is_err());
    }
}
