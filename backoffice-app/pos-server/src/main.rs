use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use pos_api::{build_router, middleware::LoginLimiter, AppState};
use pos_core::repositories::{
    BranchRepository, CustomerRepository, DiagnosticsRepository, LoyaltyRepository, PlanRepository,
    ProductRepository, SuperAdminRepository, TenantRepository, TransferRepository, UserRepository,
};
use pos_core::services::{
    AuthService, BranchService, DiagnosticsService, LoyaltyService, StockflowService, TenantAdminService,
    UserAdminService,
};
use pos_infrastructure::{
    create_pool, run_migrations, PgBranchRepository, PgCustomerRepository, PgDiagnosticsRepository,
    PgLoyaltyRepository, PgPlanRepository, PgProductRepository, PgSuperAdminRepository, PgTenantRepository,
    PgTransferRepository, PgUserRepository,
};
use pos_security::{IpAllowList, SessionTokenService};
use pos_shared::config::AppConfig;
use pos_shared::telemetry::init_telemetry;

const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("loading configuration")?;
    let _log_guard = init_telemetry(&config.log)?;

    info!("POS back-office starting ({} environment)...", config.app.env);
    if config.is_production() && config.session.secret == "change-me-in-production" {
        anyhow::bail!("session.secret must be set in production");
    }

    let pool = create_pool(&config.database).await.context("connecting to database")?;
    if config.database.run_migrations {
        run_migrations(&pool).await.context("running migrations")?;
    }

    let plans: Arc<dyn PlanRepository> = Arc::new(PgPlanRepository::new(pool.clone()));
    let tenants: Arc<dyn TenantRepository> = Arc::new(PgTenantRepository::new(pool.clone()));
    let branches: Arc<dyn BranchRepository> = Arc::new(PgBranchRepository::new(pool.clone()));
    let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
    let super_admins: Arc<dyn SuperAdminRepository> = Arc::new(PgSuperAdminRepository::new(pool.clone()));
    let products: Arc<dyn ProductRepository> = Arc::new(PgProductRepository::new(pool.clone()));
    let transfers: Arc<dyn TransferRepository> = Arc::new(PgTransferRepository::new(pool.clone()));
    let customers: Arc<dyn CustomerRepository> = Arc::new(PgCustomerRepository::new(pool.clone()));
    let loyalty: Arc<dyn LoyaltyRepository> = Arc::new(PgLoyaltyRepository::new(pool.clone()));
    let diagnostics: Arc<dyn DiagnosticsRepository> = Arc::new(PgDiagnosticsRepository::new(pool));

    let sessions = Arc::new(SessionTokenService::new(&config.session.secret, config.session.ttl_seconds));
    let auth = Arc::new(AuthService::new(super_admins, users.clone(), tenants.clone(), sessions.clone()));

    bootstrap_super_admin(&auth).await?;

    let login_limiter = Arc::new(LoginLimiter::new(config.security.login_rate_per_minute));
    let allow_list = Arc::new(IpAllowList::new(&config.security.diagnostics_allowed_ips));
    let http = reqwest::Client::builder()
        .user_agent(concat!("pos-backoffice-smoke/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let state = AppState {
        tenants: Arc::new(TenantAdminService::new(
            tenants.clone(),
            plans.clone(),
            users.clone(),
            branches.clone(),
        )),
        users: Arc::new(UserAdminService::new(users, tenants.clone(), plans.clone(), branches.clone())),
        branches: Arc::new(BranchService::new(branches.clone(), tenants.clone(), plans)),
        stockflow: Arc::new(StockflowService::new(transfers, branches.clone(), products)),
        loyalty: Arc::new(LoyaltyService::new(loyalty, customers)),
        diagnostics: Arc::new(DiagnosticsService::new(diagnostics, tenants, branches)),
        login_limiter: login_limiter.clone(),
        allow_list,
        http,
        auth,
        sessions,
        config: Arc::new(config.clone()),
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            login_limiter.retain_recent();
        }
    });

    let app = build_router(state);

    let host: std::net::IpAddr = config.app.host.parse().context("parsing app.host")?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("POS back-office stopped");
    Ok(())
}

/// `BOOTSTRAP_SUPER_ADMIN_EMAIL` / `BOOTSTRAP_SUPER_ADMIN_PASSWORD` seed the
/// first console account on an empty platform.
async fn bootstrap_super_admin(auth: &AuthService) -> anyhow::Result<()> {
    let email = std::env::var("BOOTSTRAP_SUPER_ADMIN_EMAIL").ok();
    let password = std::env::var("BOOTSTRAP_SUPER_ADMIN_PASSWORD").ok();

    match (email, password) {
        (Some(email), Some(password)) => {
            let created = auth
                .ensure_super_admin(&email, &password)
                .await
                .context("creating bootstrap super admin")?;
            if !created {
                info!("Bootstrap super admin already present");
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("Both BOOTSTRAP_SUPER_ADMIN_EMAIL and BOOTSTRAP_SUPER_ADMIN_PASSWORD are needed; skipping");
        }
        (None, None) => {}
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
