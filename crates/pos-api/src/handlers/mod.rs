//! Route handlers
//!
//! GET handlers render pages. Form POSTs redirect on success with a flash key
//! in the query string and re-render the form with the error on failure.
//! Handlers under `/api` answer with the JSON envelope.

pub mod admin;
pub mod admin_users;
pub mod auth;
pub mod diagnostics;
pub mod health;
pub mod loyalty;
pub mod stockflow;

use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pos_security::csrf::validate_csrf_token;
use pos_security::SessionClaims;
use pos_shared::constants::DEFAULT_PAGE_SIZE;
use pos_shared::Pagination;

use crate::error::{ApiError, PageError};
use crate::views::Page;

#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub flash: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.per_page.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

/// A form whose only field is the CSRF token.
#[derive(Debug, Deserialize)]
pub struct CsrfForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
}

/// Body of the AJAX active toggles.
#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub active: bool,
}

pub fn redirect_with_flash(path: &str, flash: &str) -> Redirect {
    Redirect::to(&format!("{}?flash={}", path, flash))
}

pub fn verify_csrf(claims: &SessionClaims, token: &str) -> Result<(), ApiError> {
    if validate_csrf_token(token, &claims.csrf) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "The form has expired. Reload the page and try again.".to_string(),
        ))
    }
}

pub fn actor_id(claims: &SessionClaims) -> Result<Uuid, ApiError> {
    claims
        .user_id()
        .map_err(|e| ApiError::Unauthorized(format!("Invalid session subject: {}", e)))
}

/// Renders the form page again with the error above it. Internal errors get
/// the generic error page instead.
pub fn rerender<T: Serialize>(page: Page<T>, template: &str, err: ApiError) -> Result<Response, PageError> {
    if matches!(err, ApiError::Internal(_)) {
        return Err(PageError(err));
    }
    let status = err.status();
    let html = page.with_error(err.public_message()).render(template)?;
    Ok((status, html).into_response())
}

/// Trimmed value, or `None` for a blank form field.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn parse_uuid(value: &str, field: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid {}", field)))
}

/// Optional id from a form or query field; blank means none.
pub fn parse_optional_uuid(value: Option<&str>, field: &str) -> Result<Option<Uuid>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_uuid(v, field).map(Some),
        None => Ok(None),
    }
}

/// URL-encoded query string of the non-empty filters, for pager links.
pub fn query_string(pairs: &[(&str, Option<String>)]) -> String {
    let mut url = match reqwest::Url::parse("http://localhost/") {
        Ok(url) => url,
        Err(_) => return String::new(),
    };
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                query.append_pair(key, value);
            }
        }
    }
    url.query().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_encodes_and_skips_blanks() {
        let qs = query_string(&[
            ("q", Some("kopi & teh".to_string())),
            ("status", None),
            ("branch", Some(String::new())),
        ]);
        assert_eq!(qs, "q=kopi+%26+teh");
    }

    #[test]
    fn test_optional_uuid() {
        assert_eq!(parse_optional_uuid(Some("  "), "branch").unwrap(), None);
        assert!(parse_optional_uuid(Some("nope"), "branch").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_optional_uuid(Some(&id.to_string()), "branch").unwrap(), Some(id));
    }

    #[test]
    fn test_page_query_defaults() {
        let page = PageQuery::default().pagination();
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, DEFAULT_PAGE_SIZE);
    }
}
