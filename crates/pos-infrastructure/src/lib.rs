//! # POS Infrastructure
//! 
//! PostgreSQL implementations of the repository ports (adapters).

pub mod database;

pub use database::{create_pool, run_migrations};
pub use database::postgres::{
    PgBranchRepository, PgCustomerRepository, PgDiagnosticsRepository, PgLoyaltyRepository,
    PgPlanRepository, PgProductRepository, PgSuperAdminRepository, PgTenantRepository,
    PgTransferRepository, PgUserRepository,
};
