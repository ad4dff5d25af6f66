//! Session extractors
//!
//! The session token travels in an HTTP-only cookie. Page requests without a
//! valid session are redirected to the matching login page; `/api/*` and other
//! JSON endpoints get a 401/403 envelope instead. State-changing JSON requests
//! must echo the session's CSRF token in the `X-CSRF-Token` header. HTML forms
//! carry it in a hidden `_csrf` field checked by the handlers.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, Method},
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use pos_core::domain::{TenantActor, UserRole};
use pos_security::csrf::validate_csrf_token;
use pos_security::{SessionClaims, SessionKind};
use pos_shared::config::SessionSettings;
use pos_shared::constants::CSRF_HEADER;

use crate::error::ApiError;
use crate::state::AppState;

pub const ADMIN_LOGIN_PATH: &str = "/admin/login";
pub const TENANT_LOGIN_PATH: &str = "/login";

/// Value of cookie `name`, if the request carries it.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(settings: &SessionSettings, token: &str, ttl_seconds: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.cookie_name, token, ttl_seconds
    );
    if settings.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_session_cookie(settings: &SessionSettings) -> String {
    session_cookie(settings, "", 0)
}

/// Paths answered with JSON rather than HTML.
pub fn wants_json(path: &str) -> bool {
    path.starts_with("/api/") || path == "/diagnostics/device-setup"
}

pub fn login_path_for(path: &str) -> &'static str {
    if path.starts_with("/admin") || path.starts_with("/diagnostics") || path.starts_with("/api/admin") {
        ADMIN_LOGIN_PATH
    } else {
        TENANT_LOGIN_PATH
    }
}

#[derive(Debug)]
pub enum AuthRejection {
    Json(ApiError),
    Redirect(&'static str),
}

impl AuthRejection {
    fn for_path(path: &str, err: ApiError) -> Self {
        if wants_json(path) {
            AuthRejection::Json(err)
        } else {
            AuthRejection::Redirect(login_path_for(path))
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Json(err) => err.into_response(),
            AuthRejection::Redirect(to) => Redirect::to(to).into_response(),
        }
    }
}

/// Any signed-in user.
#[derive(Debug, Clone)]
pub struct SessionUser(pub SessionClaims);

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let path = parts.uri.path().to_string();

        let token = read_cookie(&parts.headers, &state.config.session.cookie_name).ok_or_else(|| {
            AuthRejection::for_path(&path, ApiError::Unauthorized("Sign in required".to_string()))
        })?;

        let claims = state.sessions.validate(token).map_err(|e| {
            debug!("Rejected session on {}: {}", path, e);
            AuthRejection::for_path(&path, ApiError::Unauthorized("Session expired, sign in again".to_string()))
        })?;

        if wants_json(&path) && parts.method != Method::GET {
            let sent = parts
                .headers
                .get(CSRF_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if !validate_csrf_token(sent, &claims.csrf) {
                return Err(AuthRejection::Json(ApiError::Forbidden(
                    "Missing or invalid CSRF token".to_string(),
                )));
            }
        }

        Ok(SessionUser(claims))
    }
}

#[derive(Debug, Clone)]
pub struct RequireSuperAdmin(pub SessionClaims);

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let SessionUser(claims) = SessionUser::from_request_parts(parts, state).await?;
        if claims.kind != SessionKind::SuperAdmin {
            return Err(AuthRejection::for_path(
                parts.uri.path(),
                ApiError::Forbidden("Super admin access required".to_string()),
            ));
        }
        Ok(RequireSuperAdmin(claims))
    }
}

/// A tenant user, with the claims already turned into a [`TenantActor`].
#[derive(Debug, Clone)]
pub struct RequireTenantUser {
    pub claims: SessionClaims,
    pub actor: TenantActor,
}

impl RequireTenantUser {
    fn actor_from(claims: &SessionClaims) -> Option<TenantActor> {
        if claims.kind != SessionKind::TenantUser {
            return None;
        }
        let user_id = claims.user_id().ok()?;
        let tenant_id = claims.tenant_id?;
        let role = claims.role.as_deref().and_then(UserRole::from_str)?;
        Some(TenantActor::new(user_id, tenant_id, claims.branch_id, role))
    }
}

impl FromRequestParts<AppState> for RequireTenantUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let SessionUser(claims) = SessionUser::from_request_parts(parts, state).await?;
        let actor = Self::actor_from(&claims).ok_or_else(|| {
            AuthRejection::for_path(
                parts.uri.path(),
                ApiError::Forbidden("Tenant user access required".to_string()),
            )
        })?;
        Ok(RequireTenantUser { claims, actor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn settings(secure: bool) -> SessionSettings {
        SessionSettings {
            secret: "s".to_string(),
            ttl_seconds: 60,
            cookie_name: "pos_session".to_string(),
            secure_cookie: secure,
        }
    }

    #[test]
    fn test_read_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; pos_session=abc.def"));
        headers.append(header::COOKIE, HeaderValue::from_static("other=1"));

        assert_eq!(read_cookie(&headers, "pos_session"), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "other"), Some("1"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_cleared_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("pos_session="));
        assert_eq!(read_cookie(&headers, "pos_session"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&settings(true), "tok", 3600);
        assert!(cookie.starts_with("pos_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(cookie.ends_with("; Secure"));

        let cleared = clear_session_cookie(&settings(false));
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }

    #[test]
    fn test_login_path_by_area() {
        assert_eq!(login_path_for("/admin/tenants"), ADMIN_LOGIN_PATH);
        assert_eq!(login_path_for("/diagnostics/schema"), ADMIN_LOGIN_PATH);
        assert_eq!(login_path_for("/stockflow/new"), TENANT_LOGIN_PATH);
        assert!(wants_json("/api/stockflow/transfers/x/ship"));
        assert!(!wants_json("/stockflow"));
    }

    #[test]
    fn test_actor_requires_tenant_and_known_role() {
        let mut claims = SessionClaims {
            sub: Uuid::new_v4().to_string(),
            kind: SessionKind::TenantUser,
            name: "Rina".to_string(),
            tenant_id: Some(Uuid::new_v4()),
            branch_id: None,
            role: Some("cashier".to_string()),
            csrf: "c".to_string(),
            iat: 0,
            exp: 0,
        };
        let actor = RequireTenantUser::actor_from(&claims).unwrap();
        assert_eq!(actor.role, UserRole::Cashier);

        claims.role = Some("auditor".to_string());
        assert!(RequireTenantUser::actor_from(&claims).is_none());

        claims.role = Some("owner".to_string());
        claims.kind = SessionKind::SuperAdmin;
        assert!(RequireTenantUser::actor_from(&claims).is_none());
    }
}
