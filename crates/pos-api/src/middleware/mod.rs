//! Request guards: session extractors, login throttling and the diagnostics allow-list.

pub mod ip_allowlist;
pub mod rate_limit;
pub mod session;

pub use ip_allowlist::diagnostics_guard;
pub use rate_limit::LoginLimiter;
pub use session::{RequireSuperAdmin, RequireTenantUser, SessionUser};
