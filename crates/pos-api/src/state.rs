use std::sync::Arc;

use pos_core::services::{
    AuthService, BranchService, DiagnosticsService, LoyaltyService, StockflowService, TenantAdminService,
    UserAdminService,
};
use pos_security::{IpAllowList, SessionTokenService};
use pos_shared::config::AppConfig;

use crate::middleware::rate_limit::LoginLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionTokenService>,
    pub auth: Arc<AuthService>,
    pub tenants: Arc<TenantAdminService>,
    pub users: Arc<UserAdminService>,
    pub branches: Arc<BranchService>,
    pub stockflow: Arc<StockflowService>,
    pub loyalty: Arc<LoyaltyService>,
    pub diagnostics: Arc<DiagnosticsService>,
    pub login_limiter: Arc<LoginLimiter>,
    pub allow_list: Arc<IpAllowList>,
    /// Client for the diagnostics smoke test.
    pub http: reqwest::Client,
}
