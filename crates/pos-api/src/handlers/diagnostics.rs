//! Platform diagnostics pages
//!
//! Only reachable by super admins from an allow-listed address; the router
//! wraps these routes in `diagnostics_guard`.

use std::time::{Duration, Instant};

use axum::{extract::State, response::Html, Json};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use pos_core::services::DeviceSetupCheck;
use pos_shared::config::AppConfig;

use crate::error::{ApiError, PageError};
use crate::middleware::RequireSuperAdmin;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::views::Page;

/// Paths probed by the smoke test. All of them answer without a session.
pub const SMOKE_PATHS: &[&str] = &["/health", "/health/ready", "/admin/login", "/login"];

const SMOKE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn index(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let (latency, db_error) = match state.diagnostics.ping_database().await {
        Ok(ms) => (Some(ms), None),
        Err(e) => {
            warn!("Diagnostics database ping failed: {}", e);
            (None, Some(e.to_string()))
        }
    };
    let data = serde_json::json!({
        "db_latency_ms": latency,
        "db_error": db_error,
        "env": state.config.app.env,
        "version": env!("CARGO_PKG_VERSION"),
    });
    Ok(Page::new("Diagnostics", data).for_session(&claims).render("diagnostics/index")?)
}

pub async fn schema(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let report = state.diagnostics.check_schema().await?;
    Ok(Page::new("Schema check", serde_json::json!({ "report": report }))
        .for_session(&claims)
        .render("diagnostics/schema")?)
}

#[derive(Debug, Clone, Serialize)]
pub struct SmokeResult {
    pub path: String,
    pub url: String,
    pub status: Option<u16>,
    pub ok: bool,
    pub latency_ms: u128,
    pub error: Option<String>,
}

/// Requests each path against `base_url` in turn. Redirects count as healthy.
pub async fn run_smoke_test(client: &reqwest::Client, base_url: &str, paths: &[&str]) -> Vec<SmokeResult> {
    let base = base_url.trim_end_matches('/');
    let mut results = Vec::with_capacity(paths.len());

    for path in paths {
        let url = format!("{}{}", base, path);
        let started = Instant::now();
        let outcome = client.get(&url).timeout(SMOKE_TIMEOUT).send().await;
        let latency_ms = started.elapsed().as_millis();

        let result = match outcome {
            Ok(response) => {
                let status = response.status();
                SmokeResult {
                    path: path.to_string(),
                    url,
                    status: Some(status.as_u16()),
                    ok: status.is_success() || status.is_redirection(),
                    latency_ms,
                    error: None,
                }
            }
            Err(e) => SmokeResult {
                path: path.to_string(),
                url,
                status: None,
                ok: false,
                latency_ms,
                error: Some(e.to_string()),
            },
        };
        results.push(result);
    }

    let failed = results.iter().filter(|r| !r.ok).count();
    info!("Smoke test against {}: {} of {} passed", base, results.len() - failed, results.len());
    results
}

pub async fn smoke(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let base_url = state.config.app.base_url.clone();
    let results = run_smoke_test(&state.http, &base_url, SMOKE_PATHS).await;
    let data = serde_json::json!({
        "base_url": base_url,
        "results": results,
    });
    Ok(Page::new("Smoke test", data).for_session(&claims).render("diagnostics/smoke")?)
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: String,
    pub secret: bool,
}

/// Secrets are shown as a short digest so two deployments can be compared
/// without revealing the value.
fn fingerprint(value: &str) -> String {
    if value.is_empty() {
        return "(empty)".to_string();
    }
    let digest = hex::encode(Sha256::digest(value.as_bytes()));
    format!("sha256:{}", &digest[..12])
}

pub fn config_entries(config: &AppConfig) -> Vec<ConfigEntry> {
    let plain = |key, value: String| ConfigEntry {
        key,
        value,
        secret: false,
    };
    let secret = |key, value: &str| ConfigEntry {
        key,
        value: fingerprint(value),
        secret: true,
    };

    vec![
        plain("app.env", config.app.env.clone()),
        plain("app.name", config.app.name.clone()),
        plain("app.host", config.app.host.clone()),
        plain("app.port", config.app.port.to_string()),
        plain("app.base_url", config.app.base_url.clone()),
        plain("app.request_timeout_secs", config.app.request_timeout_secs.to_string()),
        plain("app.assets_dir", config.app.assets_dir.clone()),
        secret("database.url", &config.database.url),
        plain("database.max_connections", config.database.max_connections.to_string()),
        plain("database.min_connections", config.database.min_connections.to_string()),
        plain("database.run_migrations", config.database.run_migrations.to_string()),
        secret("session.secret", &config.session.secret),
        plain("session.ttl_seconds", config.session.ttl_seconds.to_string()),
        plain("session.cookie_name", config.session.cookie_name.clone()),
        plain("session.secure_cookie", config.session.secure_cookie.to_string()),
        plain("log.level", config.log.level.clone()),
        plain("log.json", config.log.json.to_string()),
        plain("log.directory", config.log.directory.clone().unwrap_or_default()),
        plain(
            "security.diagnostics_allowed_ips",
            config.security.diagnostics_allowed_ips.join(", "),
        ),
        plain(
            "security.login_rate_per_minute",
            config.security.login_rate_per_minute.to_string(),
        ),
    ]
}

pub async fn config(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let entries = config_entries(&state.config);
    Ok(Page::new("Configuration", serde_json::json!({ "entries": entries }))
        .for_session(&claims)
        .render("diagnostics/config")?)
}

#[derive(Debug, Deserialize)]
pub struct DeviceSetupRequest {
    pub tenant_slug: String,
    pub branch_code: String,
    #[serde(default)]
    pub device_name: String,
}

pub async fn device_setup(
    RequireSuperAdmin(_): RequireSuperAdmin,
    State(state): State<AppState>,
    Json(body): Json<DeviceSetupRequest>,
) -> Result<Json<ApiResponse<DeviceSetupCheck>>, ApiError> {
    let check = state
        .diagnostics
        .device_setup_check(&body.tenant_slug, &body.branch_code, &body.device_name)
        .await?;
    Ok(Json(ApiResponse::success(check)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_smoke_test_reports_each_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health/ready"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let base = format!("{}/", server.uri());
        let results = run_smoke_test(&client, &base, &["/health", "/health/ready", "/login"]).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, Some(200));
        assert!(results[0].ok);
        assert_eq!(results[0].url, format!("{}/health", server.uri()));
        assert_eq!(results[1].status, Some(503));
        assert!(!results[1].ok);
        // Unmatched requests get wiremock's 404.
        assert_eq!(results[2].status, Some(404));
        assert!(!results[2].ok);
    }

    #[tokio::test]
    async fn test_smoke_test_records_connection_errors() {
        let client = reqwest::Client::new();
        let results = run_smoke_test(&client, "http://127.0.0.1:9", &["/health"]).await;
        assert_eq!(results[0].status, None);
        assert!(!results[0].ok);
        assert!(results[0].error.is_some());
    }

    #[test]
    fn test_fingerprint_hides_value() {
        let fp = fingerprint("postgres://pos:hunter2@db/pos");
        assert!(fp.starts_with("sha256:"));
        assert_eq!(fp.len(), "sha256:".len() + 12);
        assert!(!fp.contains("hunter2"));
        assert_eq!(fingerprint(""), "(empty)");
    }

    #[test]
    fn test_config_entries_redact_secrets() {
        let config = AppConfig::defaults().unwrap();
        let entries = config_entries(&config);

        let secrets: Vec<&str> = entries.iter().filter(|e| e.secret).map(|e| e.key).collect();
        assert_eq!(secrets, vec!["database.url", "session.secret"]);
        assert!(entries.iter().all(|e| !e.value.contains("change-me")));
        assert!(entries.iter().all(|e| !e.value.contains("postgres:postgres")));
    }
}
