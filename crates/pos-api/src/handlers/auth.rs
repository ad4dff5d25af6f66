//! Sign-in and sign-out for both consoles

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use pos_core::services::LoginResult;

use crate::error::{ApiError, PageError};
use crate::handlers::{redirect_with_flash, verify_csrf, CsrfForm, FlashQuery};
use crate::middleware::session::{clear_session_cookie, read_cookie, session_cookie, ADMIN_LOGIN_PATH, TENANT_LOGIN_PATH};
use crate::state::AppState;
use crate::views::Page;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginView {
    heading: &'static str,
    action: &'static str,
    email: String,
}

#[derive(Clone, Copy)]
enum Console {
    Admin,
    Tenant,
}

impl Console {
    fn view(self, email: String) -> LoginView {
        match self {
            Console::Admin => LoginView {
                heading: "Platform console sign-in",
                action: ADMIN_LOGIN_PATH,
                email,
            },
            Console::Tenant => LoginView {
                heading: "Back-office sign-in",
                action: TENANT_LOGIN_PATH,
                email,
            },
        }
    }

    fn login_path(self) -> &'static str {
        match self {
            Console::Admin => ADMIN_LOGIN_PATH,
            Console::Tenant => TENANT_LOGIN_PATH,
        }
    }

    fn home(self) -> &'static str {
        match self {
            Console::Admin => "/admin",
            Console::Tenant => "/stockflow",
        }
    }
}

fn login_page(console: Console, flash: Option<&str>) -> Result<Response, PageError> {
    let html = Page::new("Sign in", console.view(String::new()))
        .with_flash(flash)
        .render("login")?;
    Ok(html.into_response())
}

/// The form again with the error, keeping the typed email.
fn login_failed(console: Console, email: String, err: ApiError) -> Response {
    let status = err.status();
    match Page::new("Sign in", console.view(email))
        .with_error(err.public_message())
        .render("login")
    {
        Ok(html) => (status, html).into_response(),
        Err(e) => PageError(e).into_response(),
    }
}

async fn sign_in(
    state: &AppState,
    console: Console,
    addr: SocketAddr,
    form: LoginForm,
) -> Response {
    if let Err(e) = state.login_limiter.check(addr.ip(), console.login_path()) {
        return login_failed(console, form.email, e);
    }

    let result = match console {
        Console::Admin => state.auth.login_super_admin(&form.email, &form.password).await,
        Console::Tenant => state.auth.login_tenant_user(&form.email, &form.password).await,
    };

    match result {
        Ok(LoginResult { token, claims }) => {
            info!("{} signed in from {}", claims.name, addr.ip());
            let cookie = session_cookie(&state.config.session, &token, state.sessions.ttl_seconds());
            ([(header::SET_COOKIE, cookie)], Redirect::to(console.home())).into_response()
        }
        Err(e) => login_failed(console, form.email, e.into()),
    }
}

pub async fn admin_login_page(Query(q): Query<FlashQuery>) -> Result<Response, PageError> {
    login_page(Console::Admin, q.flash.as_deref())
}

pub async fn admin_login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<LoginForm>,
) -> Response {
    sign_in(&state, Console::Admin, addr, form).await
}

pub async fn tenant_login_page(Query(q): Query<FlashQuery>) -> Result<Response, PageError> {
    login_page(Console::Tenant, q.flash.as_deref())
}

pub async fn tenant_login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<LoginForm>,
) -> Response {
    sign_in(&state, Console::Tenant, addr, form).await
}

fn sign_out(state: &AppState, headers: &HeaderMap, form: &CsrfForm, login: &str) -> Response {
    let claims = read_cookie(headers, &state.config.session.cookie_name).and_then(|t| state.sessions.validate(t).ok());

    if let Some(claims) = claims {
        if let Err(e) = verify_csrf(&claims, &form.csrf) {
            return PageError(e).into_response();
        }
        info!("{} signed out", claims.name);
    }

    (
        [(header::SET_COOKIE, clear_session_cookie(&state.config.session))],
        redirect_with_flash(login, "logged-out"),
    )
        .into_response()
}

pub async fn admin_logout(State(state): State<AppState>, headers: HeaderMap, Form(form): Form<CsrfForm>) -> Response {
    sign_out(&state, &headers, &form, ADMIN_LOGIN_PATH)
}

pub async fn tenant_logout(State(state): State<AppState>, headers: HeaderMap, Form(form): Form<CsrfForm>) -> Response {
    sign_out(&state, &headers, &form, TENANT_LOGIN_PATH)
}
