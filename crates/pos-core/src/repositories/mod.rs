//! Repository traits (ports)

pub mod plan_repository;
pub mod tenant_repository;
pub mod branch_repository;
pub mod user_repository;
pub mod super_admin_repository;
pub mod product_repository;
pub mod transfer_repository;
pub mod customer_repository;
pub mod loyalty_repository;
pub mod diagnostics_repository;

pub use plan_repository::{PlanRepository, PlanUsage};
pub use tenant_repository::{PlatformCounts, TenantFilter, TenantRepository, TenantSummary};
pub use branch_repository::BranchRepository;
pub use user_repository::{UserFilter, UserRepository, UserSummary};
pub use super_admin_repository::SuperAdminRepository;
pub use product_repository::ProductRepository;
pub use transfer_repository::{TransferFilter, TransferRepository, TransferSummary};
pub use customer_repository::CustomerRepository;
pub use loyalty_repository::{LedgerLine, LoyaltyRepository, MemberBalance};
pub use diagnostics_repository::{ColumnInfo, DiagnosticsRepository};

#[cfg(any(test, feature = "mocks"))]
pub use plan_repository::MockPlanRepository;
#[cfg(any(test, feature = "mocks"))]
pub use tenant_repository::MockTenantRepository;
#[cfg(any(test, feature = "mocks"))]
pub use branch_repository::MockBranchRepository;
#[cfg(any(test, feature = "mocks"))]
pub use user_repository::MockUserRepository;
#[cfg(any(test, feature = "mocks"))]
pub use super_admin_repository::MockSuperAdminRepository;
#[cfg(any(test, feature = "mocks"))]
pub use product_repository::MockProductRepository;
#[cfg(any(test, feature = "mocks"))]
pub use transfer_repository::MockTransferRepository;
#[cfg(any(test, feature = "mocks"))]
pub use customer_repository::MockCustomerRepository;
#[cfg(any(test, feature = "mocks"))]
pub use loyalty_repository::MockLoyaltyRepository;
#[cfg(any(test, feature = "mocks"))]
pub use diagnostics_repository::MockDiagnosticsRepository;
