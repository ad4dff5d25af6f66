//! Domain services (business logic)

pub mod auth_service;
pub mod tenant_admin_service;
pub mod user_admin_service;
pub mod branch_service;
pub mod stockflow_service;
pub mod loyalty_service;
pub mod diagnostics_service;

pub use auth_service::{AuthService, LoginResult};
pub use tenant_admin_service::{NewPlan, NewTenant, TenantAdminService, TenantDetail};
pub use user_admin_service::{NewUser, UserAdminService, UserUpdate};
pub use branch_service::{BranchService, NewBranch};
pub use stockflow_service::{NewTransfer, StockflowService, TransferOptions};
pub use loyalty_service::{LoyaltyService, NewProgram, ProgramOverview};
pub use diagnostics_service::{
    DeviceSetupCheck, DiagnosticsService, SchemaReport, TableReport, EXPECTED_SCHEMA,
};
