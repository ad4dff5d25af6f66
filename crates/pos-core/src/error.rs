//! Domain errors

use thiserror::Error;
use uuid::Uuid;

use crate::domain::{TransferAction, TransferStatus};

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not active")]
    AccountNotActive,

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Tenant not active")]
    TenantNotActive,

    #[error("Tenant subscription expired")]
    SubscriptionExpired,

    #[error("Tenant slug already exists: {0}")]
    TenantSlugAlreadyExists(String),

    #[error("Subscription plan not found: {0}")]
    PlanNotFound(String),

    #[error("Subscription plan code already exists: {0}")]
    PlanCodeAlreadyExists(String),

    #[error("Branch not found")]
    BranchNotFound,

    #[error("Branch code already exists in tenant: {0}")]
    BranchCodeAlreadyExists(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Email already exists: {0}")]
    EmailAlreadyExists(String),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Transfer not found")]
    TransferNotFound,

    #[error("Cannot {action} a {from} transfer")]
    InvalidTransition { from: TransferStatus, action: TransferAction },

    #[error("Insufficient stock for product {product_id} at branch {branch_id}")]
    InsufficientStock { product_id: Uuid, branch_id: Uuid },

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Loyalty program not found")]
    ProgramNotFound,

    #[error("Loyalty program is closed")]
    ProgramClosed,

    #[error("Insufficient stamps: balance {balance}, needed {needed}")]
    InsufficientStamps { balance: i64, needed: i64 },

    #[error("Resource belongs to another tenant")]
    CrossTenantAccess,

    #[error("Plan limit reached: {0}")]
    LimitReached(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Password too short")]
    PasswordTooShort,

    #[error("Password too long")]
    PasswordTooLong,

    #[error("Password too weak")]
    PasswordTooWeak,

    #[error("Password hash error: {0}")]
    PasswordHashError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::ValidationError(errors.to_string())
    }
}

impl From<pos_security::PasswordError> for DomainError {
    fn from(error: pos_security::PasswordError) -> Self {
        use pos_security::PasswordError;

        match error {
            PasswordError::TooShort => DomainError::PasswordTooShort,
            PasswordError::TooLong => DomainError::PasswordTooLong,
            PasswordError::TooWeak => DomainError::PasswordTooWeak,
            other => DomainError::PasswordHashError(other.to_string()),
        }
    }
}
