//! Router-level test fixtures: an `AppState` over mocked repositories and
//! helpers for signed-in requests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header, Request},
    Router,
};
use uuid::Uuid;

use pos_core::repositories::{
    BranchRepository, CustomerRepository, DiagnosticsRepository, LoyaltyRepository, MockBranchRepository,
    MockCustomerRepository, MockDiagnosticsRepository, MockLoyaltyRepository, MockPlanRepository,
    MockProductRepository, MockSuperAdminRepository, MockTenantRepository, MockTransferRepository,
    MockUserRepository, PlanRepository, ProductRepository, SuperAdminRepository, TenantRepository,
    TransferRepository, UserRepository,
};
use pos_core::services::{
    AuthService, BranchService, DiagnosticsService, LoyaltyService, StockflowService, TenantAdminService,
    UserAdminService,
};
use pos_security::{IpAllowList, SessionKind, SessionSubject, SessionTokenService};
use pos_shared::config::AppConfig;
use pos_shared::constants::CSRF_HEADER;

use crate::middleware::LoginLimiter;
use crate::router::build_router;
use crate::state::AppState;

/// Mocks with no expectations set; tests configure the ones they touch.
#[derive(Default)]
pub struct MockRepos {
    pub plans: MockPlanRepository,
    pub tenants: MockTenantRepository,
    pub branches: MockBranchRepository,
    pub users: MockUserRepository,
    pub super_admins: MockSuperAdminRepository,
    pub products: MockProductRepository,
    pub transfers: MockTransferRepository,
    pub customers: MockCustomerRepository,
    pub loyalty: MockLoyaltyRepository,
    pub diagnostics: MockDiagnosticsRepository,
}

impl MockRepos {
    pub fn into_state(self) -> AppState {
        let config = AppConfig::defaults().expect("default config");

        let plans: Arc<dyn PlanRepository> = Arc::new(self.plans);
        let tenants: Arc<dyn TenantRepository> = Arc::new(self.tenants);
        let branches: Arc<dyn BranchRepository> = Arc::new(self.branches);
        let users: Arc<dyn UserRepository> = Arc::new(self.users);
        let super_admins: Arc<dyn SuperAdminRepository> = Arc::new(self.super_admins);
        let products: Arc<dyn ProductRepository> = Arc::new(self.products);
        let transfers: Arc<dyn TransferRepository> = Arc::new(self.transfers);
        let customers: Arc<dyn CustomerRepository> = Arc::new(self.customers);
        let loyalty: Arc<dyn LoyaltyRepository> = Arc::new(self.loyalty);
        let diagnostics: Arc<dyn DiagnosticsRepository> = Arc::new(self.diagnostics);

        let sessions = Arc::new(SessionTokenService::new(&config.session.secret, config.session.ttl_seconds));

        AppState {
            auth: Arc::new(AuthService::new(
                super_admins,
                users.clone(),
                tenants.clone(),
                sessions.clone(),
            )),
            tenants: Arc::new(TenantAdminService::new(
                tenants.clone(),
                plans.clone(),
                users.clone(),
                branches.clone(),
            )),
            users: Arc::new(UserAdminService::new(
                users,
                tenants.clone(),
                plans.clone(),
                branches.clone(),
            )),
            branches: Arc::new(BranchService::new(branches.clone(), tenants.clone(), plans)),
            stockflow: Arc::new(StockflowService::new(transfers, branches.clone(), products)),
            loyalty: Arc::new(LoyaltyService::new(loyalty, customers)),
            diagnostics: Arc::new(DiagnosticsService::new(diagnostics, tenants, branches)),
            login_limiter: Arc::new(LoginLimiter::new(config.security.login_rate_per_minute)),
            allow_list: Arc::new(IpAllowList::new(&config.security.diagnostics_allowed_ips)),
            http: reqwest::Client::new(),
            sessions,
            config: Arc::new(config),
        }
    }
}

/// The full router as a client at `peer` sees it.
pub fn app_from(state: AppState, peer: &str) -> Router {
    let addr: SocketAddr = peer.parse().expect("socket address");
    build_router(state).layer(MockConnectInfo(addr))
}

pub fn app(state: AppState) -> Router {
    app_from(state, "127.0.0.1:40000")
}

/// Session cookie plus the matching CSRF token.
pub struct TestSession {
    pub cookie: String,
    pub csrf: String,
}

impl TestSession {
    fn issue(state: &AppState, subject: SessionSubject) -> Self {
        let (token, claims) = state.sessions.issue(&subject).expect("issue session");
        Self {
            cookie: format!("{}={}", state.config.session.cookie_name, token),
            csrf: claims.csrf,
        }
    }

    pub fn super_admin(state: &AppState) -> Self {
        Self::issue(
            state,
            SessionSubject {
                id: Uuid::new_v4(),
                kind: SessionKind::SuperAdmin,
                name: "Platform Admin".to_string(),
                tenant_id: None,
                branch_id: None,
                role: None,
            },
        )
    }

    pub fn tenant_user(state: &AppState, tenant_id: Uuid, role: &str) -> Self {
        Self::issue(
            state,
            SessionSubject {
                id: Uuid::new_v4(),
                kind: SessionKind::TenantUser,
                name: "Sari".to_string(),
                tenant_id: Some(tenant_id),
                branch_id: None,
                role: Some(role.to_string()),
            },
        )
    }

    pub fn get(&self, uri: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::COOKIE, &self.cookie)
            .body(Body::empty())
            .expect("request")
    }

    /// JSON POST carrying the CSRF header.
    pub fn post_json(&self, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::COOKIE, &self.cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .header(CSRF_HEADER, &self.csrf)
            .body(Body::from(body.to_string()))
            .expect("request")
    }
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8_lossy(&bytes).into_owned()
}
