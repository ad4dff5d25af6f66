//! PostgreSQL repository implementations

use tracing::error;

use pos_core::error::DomainError;

pub mod plan_repo_impl;
pub mod tenant_repo_impl;
pub mod branch_repo_impl;
pub mod user_repo_impl;
pub mod super_admin_repo_impl;
pub mod product_repo_impl;
pub mod transfer_repo_impl;
pub mod customer_repo_impl;
pub mod loyalty_repo_impl;
pub mod diagnostics_repo_impl;

pub use plan_repo_impl::PgPlanRepository;
pub use tenant_repo_impl::PgTenantRepository;
pub use branch_repo_impl::PgBranchRepository;
pub use user_repo_impl::PgUserRepository;
pub use super_admin_repo_impl::PgSuperAdminRepository;
pub use product_repo_impl::PgProductRepository;
pub use transfer_repo_impl::PgTransferRepository;
pub use customer_repo_impl::PgCustomerRepository;
pub use loyalty_repo_impl::PgLoyaltyRepository;
pub use diagnostics_repo_impl::PgDiagnosticsRepository;

/// Logs and wraps a driver error.
pub(crate) fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    error!("Database error {}: {}", context, e);
    DomainError::DatabaseError(e.to_string())
}

/// Name of the violated unique constraint, if that is what `e` is.
pub(crate) fn unique_violation(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}
