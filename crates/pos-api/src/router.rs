use std::time::Duration;

use axum::{
    http::StatusCode,
    middleware,
    response::{Redirect, Response},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers::{admin, admin_users, auth, diagnostics, health, loyalty, stockflow};
use crate::middleware::diagnostics_guard;
use crate::state::AppState;
use crate::views;

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(|| async { Redirect::to("/login") }))
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/admin/login", get(auth::admin_login_page).post(auth::admin_login))
        .route("/login", get(auth::tenant_login_page).post(auth::tenant_login))
        .route("/admin/logout", post(auth::admin_logout))
        .route("/logout", post(auth::tenant_logout));

    let admin_routes = Router::new()
        .route("/admin", get(admin::dashboard))
        .route("/admin/tenants", get(admin::tenants_index))
        .route("/admin/tenants/new", get(admin::tenant_new_page).post(admin::tenant_create))
        .route("/admin/tenants/{id}", get(admin::tenant_show).post(admin::tenant_update))
        .route("/admin/tenants/{id}/plan", post(admin::tenant_change_plan))
        .route("/admin/tenants/{id}/branches", post(admin::tenant_add_branch))
        .route("/admin/tenants/{id}/branches/{branch_id}", post(admin::tenant_update_branch))
        .route("/admin/tenants/{id}/delete", post(admin::tenant_delete))
        .route("/admin/users", get(admin_users::users_index))
        .route("/admin/users/new", get(admin_users::user_new_page).post(admin_users::user_create))
        .route("/admin/users/{id}", get(admin_users::user_show).post(admin_users::user_update))
        .route("/admin/users/{id}/reset-password", post(admin_users::user_reset_password))
        .route("/admin/plans", get(admin::plans_index).post(admin::plan_create))
        .route("/admin/plans/{id}", post(admin::plan_update))
        .route("/api/admin/tenants/{id}/active", post(admin::api_tenant_active))
        .route("/api/admin/tenants/{id}/branches", get(admin::api_tenant_branches))
        .route("/api/admin/users/{id}/active", post(admin_users::api_user_active))
        .route("/api/admin/branches/{id}/active", post(admin::api_branch_active))
        .route("/api/admin/plans/{id}/active", post(admin::api_plan_active));

    let tenant_routes = Router::new()
        .route("/stockflow", get(stockflow::index))
        .route("/stockflow/new", get(stockflow::new_page).post(stockflow::create))
        .route("/stockflow/stock", get(stockflow::stock))
        .route("/stockflow/{id}", get(stockflow::show))
        .route("/api/stockflow/transfers/{id}/ship", post(stockflow::api_ship))
        .route("/api/stockflow/transfers/{id}/receive", post(stockflow::api_receive))
        .route("/api/stockflow/transfers/{id}/cancel", post(stockflow::api_cancel))
        .route("/loyalty", get(loyalty::programs))
        .route("/loyalty/programs/new", get(loyalty::program_new_page).post(loyalty::program_create))
        .route("/loyalty/programs/{id}", get(loyalty::program_show).post(loyalty::program_update))
        .route("/loyalty/customers", get(loyalty::customers).post(loyalty::customer_create))
        .route("/api/loyalty/programs/{id}/active", post(loyalty::api_program_active))
        .route("/api/loyalty/programs/{id}/cards/{customer_id}", get(loyalty::api_card))
        .route("/api/loyalty/programs/{id}/earn", post(loyalty::api_earn))
        .route("/api/loyalty/programs/{id}/redeem", post(loyalty::api_redeem))
        .route("/api/loyalty/programs/{id}/adjust", post(loyalty::api_adjust));

    // Allow-list first; the session extractors only run for allowed addresses.
    let diagnostics_routes = Router::new()
        .route("/diagnostics", get(diagnostics::index))
        .route("/diagnostics/schema", get(diagnostics::schema))
        .route("/diagnostics/smoke", get(diagnostics::smoke))
        .route("/diagnostics/config", get(diagnostics::config))
        .route("/diagnostics/device-setup", post(diagnostics::device_setup))
        .route_layer(middleware::from_fn_with_state(state.clone(), diagnostics_guard));

    let timeout = Duration::from_secs(state.config.app.request_timeout_secs);
    let assets = ServeDir::new(&state.config.app.assets_dir);

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .merge(tenant_routes)
        .merge(diagnostics_routes)
        .nest_service("/assets", assets)
        .fallback(not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)),
        )
}

async fn not_found() -> Response {
    views::error_page(StatusCode::NOT_FOUND, "There is nothing at this address.")
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use fake::faker::name::en::FirstName;
    use fake::Fake;
    use tower::ServiceExt;
    use uuid::Uuid;

    use pos_core::domain::Customer;
    use pos_core::error::DomainError;
    use pos_shared::PageResult;

    use crate::test_support::{app, app_from, body_text, MockRepos, TestSession};

    #[tokio::test]
    async fn test_health_sets_request_id() {
        let response = app(MockRepos::default().into_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(body_text(response).await.contains("healthy"));
    }

    #[tokio::test]
    async fn test_readiness_reports_database_outage() {
        let mut repos = MockRepos::default();
        repos
            .diagnostics
            .expect_ping()
            .returning(|| Err(DomainError::DatabaseError("connection refused".into())));

        let response = app(repos.into_state())
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_pages_without_session_redirect_to_login() {
        let state = MockRepos::default().into_state();

        let response = app(state.clone())
            .oneshot(Request::get("/admin/tenants").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/admin/login");

        let response = app(state)
            .oneshot(Request::get("/stockflow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[tokio::test]
    async fn test_api_without_session_is_401_json() {
        let uri = format!("/api/stockflow/transfers/{}/ship", Uuid::new_v4());
        let response = app(MockRepos::default().into_state())
            .oneshot(Request::post(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_api_post_requires_csrf_header() {
        let state = MockRepos::default().into_state();
        let session = TestSession::tenant_user(&state, Uuid::new_v4(), "owner");

        let request = Request::post(format!("/api/loyalty/programs/{}/active", Uuid::new_v4()))
            .header(header::COOKIE, &session.cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"active":false}"#))
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_tenant_user_cannot_enter_platform_console() {
        let state = MockRepos::default().into_state();
        let session = TestSession::tenant_user(&state, Uuid::new_v4(), "owner");

        let response = app(state.clone()).oneshot(session.get("/admin")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/admin/login");

        let uri = format!("/api/admin/tenants/{}/active", Uuid::new_v4());
        let response = app(state)
            .oneshot(session.post_json(&uri, serde_json::json!({ "active": false })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_diagnostics_refuses_unlisted_address() {
        let state = MockRepos::default().into_state();
        let session = TestSession::super_admin(&state);

        let response = app_from(state, "10.1.2.3:51000")
            .oneshot(session.get("/diagnostics/config"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_diagnostics_config_from_loopback_is_redacted() {
        let state = MockRepos::default().into_state();
        let session = TestSession::super_admin(&state);
        let secret = state.config.session.secret.clone();

        let response = app(state).oneshot(session.get("/diagnostics/config")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("session.secret"));
        assert!(!html.contains(&secret));
    }

    #[tokio::test]
    async fn test_customer_list_is_scoped_to_session_tenant() {
        let tenant_id = Uuid::new_v4();
        let first: String = FirstName().fake();
        let name = format!("{} Santoso", first.chars().filter(|c| c.is_alphabetic()).collect::<String>());
        let customer = Customer::new(tenant_id, name.clone(), None, None).unwrap();

        let mut repos = MockRepos::default();
        repos
            .customers
            .expect_list()
            .withf(move |tenant, search, _| *tenant == tenant_id && search.is_none())
            .returning(move |_, _, page| Ok(PageResult::new(vec![customer.clone()], 1, page)));
        let state = repos.into_state();
        let session = TestSession::tenant_user(&state, tenant_id, "cashier");

        let response = app(state).oneshot(session.get("/loyalty/customers")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(&name));
    }

    #[tokio::test]
    async fn test_unknown_path_renders_404_page() {
        let response = app(MockRepos::default().into_state())
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("There is nothing at this address."));
    }
}
