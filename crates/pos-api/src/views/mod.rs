//! Server-rendered pages
//!
//! Templates are compiled into the binary and registered once. Every page is
//! rendered through [`Page`], which carries the session bits the shared layout
//! needs (navigation area, user name, CSRF token) next to the page data.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::DateTime;
use handlebars::{handlebars_helper, Handlebars};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::error;

use pos_security::{SessionClaims, SessionKind};
use pos_shared::utils::format_cents;

use crate::error::ApiError;

const TEMPLATES: &[(&str, &str)] = &[
    ("layout", include_str!("../../templates/layout.hbs")),
    ("pager", include_str!("../../templates/pager.hbs")),
    ("error", include_str!("../../templates/error.hbs")),
    ("login", include_str!("../../templates/login.hbs")),
    ("admin/dashboard", include_str!("../../templates/admin/dashboard.hbs")),
    ("admin/tenants", include_str!("../../templates/admin/tenants.hbs")),
    ("admin/tenant_new", include_str!("../../templates/admin/tenant_new.hbs")),
    ("admin/tenant_detail", include_str!("../../templates/admin/tenant_detail.hbs")),
    ("admin/users", include_str!("../../templates/admin/users.hbs")),
    ("admin/user_new", include_str!("../../templates/admin/user_new.hbs")),
    ("admin/user_detail", include_str!("../../templates/admin/user_detail.hbs")),
    ("admin/plans", include_str!("../../templates/admin/plans.hbs")),
    ("stockflow/index", include_str!("../../templates/stockflow/index.hbs")),
    ("stockflow/new", include_str!("../../templates/stockflow/new.hbs")),
    ("stockflow/detail", include_str!("../../templates/stockflow/detail.hbs")),
    ("stockflow/stock", include_str!("../../templates/stockflow/stock.hbs")),
    ("loyalty/programs", include_str!("../../templates/loyalty/programs.hbs")),
    ("loyalty/program_new", include_str!("../../templates/loyalty/program_new.hbs")),
    ("loyalty/program_detail", include_str!("../../templates/loyalty/program_detail.hbs")),
    ("loyalty/customers", include_str!("../../templates/loyalty/customers.hbs")),
    ("diagnostics/index", include_str!("../../templates/diagnostics/index.hbs")),
    ("diagnostics/schema", include_str!("../../templates/diagnostics/schema.hbs")),
    ("diagnostics/smoke", include_str!("../../templates/diagnostics/smoke.hbs")),
    ("diagnostics/config", include_str!("../../templates/diagnostics/config.hbs")),
];

handlebars_helper!(money: |v: Json| v.as_i64().map(format_cents).unwrap_or_default());

handlebars_helper!(datetime: |v: Json| match v.as_str() {
    Some(s) => DateTime::parse_from_rfc3339(s)
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| s.to_string()),
    None => String::new(),
});

handlebars_helper!(date: |v: Json| match v.as_str() {
    Some(s) => DateTime::parse_from_rfc3339(s)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| s.to_string()),
    None => String::new(),
});

handlebars_helper!(inc: |v: i64| v + 1);
handlebars_helper!(dec: |v: i64| v - 1);

static VIEWS: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut hb = Handlebars::new();
    hb.register_helper("money", Box::new(money));
    hb.register_helper("datetime", Box::new(datetime));
    hb.register_helper("date", Box::new(date));
    hb.register_helper("inc", Box::new(inc));
    hb.register_helper("dec", Box::new(dec));

    for (name, source) in TEMPLATES {
        if let Err(e) = hb.register_template_string(name, *source) {
            error!("Template {} failed to compile: {}", name, e);
        }
    }
    hb
});

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Public,
    Admin,
    Tenant,
}

#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub title: String,
    pub area: Area,
    pub user_name: Option<String>,
    pub role: Option<String>,
    pub csrf: Option<String>,
    pub flash: Option<&'static str>,
    pub error: Option<String>,
    pub data: T,
}

impl<T: Serialize> Page<T> {
    pub fn new(title: impl Into<String>, data: T) -> Self {
        Self {
            title: title.into(),
            area: Area::Public,
            user_name: None,
            role: None,
            csrf: None,
            flash: None,
            error: None,
            data,
        }
    }

    pub fn for_session(mut self, claims: &SessionClaims) -> Self {
        self.area = match claims.kind {
            SessionKind::SuperAdmin => Area::Admin,
            SessionKind::TenantUser => Area::Tenant,
        };
        self.user_name = Some(claims.name.clone());
        self.role = claims.role.clone();
        self.csrf = Some(claims.csrf.clone());
        self
    }

    pub fn with_flash(mut self, key: Option<&str>) -> Self {
        self.flash = key.and_then(flash_message);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn render(&self, template: &str) -> Result<Html<String>, ApiError> {
        VIEWS.render(template, self).map(Html).map_err(|e| {
            error!("Rendering {} failed: {}", template, e);
            ApiError::Internal(format!("render {}: {}", template, e))
        })
    }
}

/// Success messages carried across a redirect as `?flash=<key>`.
pub fn flash_message(key: &str) -> Option<&'static str> {
    Some(match key {
        "tenant-created" => "Tenant created.",
        "tenant-updated" => "Tenant updated.",
        "tenant-deleted" => "Tenant deleted.",
        "plan-changed" => "Subscription plan changed.",
        "branch-created" => "Branch added.",
        "branch-updated" => "Branch updated.",
        "plan-created" => "Plan created.",
        "plan-updated" => "Plan updated.",
        "user-created" => "User created.",
        "user-updated" => "User updated.",
        "transfer-created" => "Transfer created.",
        "program-created" => "Loyalty program created.",
        "program-updated" => "Loyalty program updated.",
        "customer-created" => "Customer added.",
        "logged-out" => "You have been signed out.",
        _ => return None,
    })
}

#[derive(Serialize)]
struct ErrorView<'a> {
    status: u16,
    reason: &'a str,
    message: &'a str,
}

pub fn error_page(status: StatusCode, message: &str) -> Response {
    let view = ErrorView {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Error"),
        message,
    };
    match Page::new(view.reason, view).render("error") {
        Ok(html) => (status, html).into_response(),
        Err(_) => (status, message.to_string()).into_response(),
    }
}
