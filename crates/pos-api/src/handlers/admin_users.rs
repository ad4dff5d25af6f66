//! Platform console: tenant users across all tenants

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pos_core::domain::{Branch, User, UserRole};
use pos_core::repositories::{TenantFilter, TenantSummary, UserFilter};
use pos_core::services::{NewUser, UserUpdate};
use pos_security::SessionClaims;
use pos_shared::constants::MAX_PAGE_SIZE;
use pos_shared::Pagination;

use crate::error::{ApiError, PageError};
use crate::handlers::{
    actor_id, non_empty, parse_optional_uuid, parse_uuid, query_string, redirect_with_flash, rerender, verify_csrf,
    CsrfForm, FlashQuery, PageQuery, ToggleRequest,
};
use crate::middleware::RequireSuperAdmin;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::views::Page;

fn role_names() -> Vec<&'static str> {
    UserRole::ALL.iter().map(|r| r.as_str()).collect()
}

fn parse_role(value: &str) -> Result<UserRole, ApiError> {
    UserRole::from_str(value.trim()).ok_or_else(|| ApiError::Validation(format!("Unknown role '{}'", value)))
}

/// Tenants offered in the filter and form dropdowns.
async fn tenant_choices(state: &AppState) -> Result<Vec<TenantSummary>, ApiError> {
    let page = state
        .tenants
        .list_tenants(&TenantFilter::default(), Pagination::new(1, MAX_PAGE_SIZE))
        .await?;
    Ok(page.items)
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub tenant: Option<String>,
    pub role: Option<String>,
    pub q: Option<String>,
}

pub async fn users_index(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Query(filter): Query<UserListQuery>,
    Query(page): Query<PageQuery>,
    Query(flash): Query<FlashQuery>,
) -> Result<Html<String>, PageError> {
    let tenant_id = parse_optional_uuid(filter.tenant.as_deref(), "tenant")?;
    let role = non_empty(filter.role).map(|r| parse_role(&r)).transpose()?;
    let search = non_empty(filter.q);

    let users = state
        .users
        .list_users(
            &UserFilter {
                tenant_id,
                role,
                search: search.clone(),
            },
            page.pagination(),
        )
        .await?;
    let tenants = tenant_choices(&state).await?;

    let qs = query_string(&[
        ("tenant", tenant_id.map(|t| t.to_string())),
        ("role", role.map(|r| r.as_str().to_string())),
        ("q", search.clone()),
    ]);
    let data = serde_json::json!({
        "users": users,
        "tenants": tenants,
        "tenant_id": tenant_id,
        "role": role,
        "search": search,
        "roles": role_names(),
        "qs": qs,
    });
    Ok(Page::new("Users", data)
        .for_session(&claims)
        .with_flash(flash.flash.as_deref())
        .render("admin/users")?)
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UserForm {
    #[serde(rename = "_csrf", default, skip_serializing)]
    pub csrf: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub branch_id: Option<String>,
    pub display_name: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing)]
    pub password: String,
}

#[derive(Serialize)]
struct UserNewView<'a> {
    tenants: Vec<TenantSummary>,
    roles: Vec<&'static str>,
    form: &'a UserForm,
}

pub async fn user_new_page(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let form = UserForm {
        role: UserRole::Cashier.as_str().to_string(),
        ..UserForm::default()
    };
    let view = UserNewView {
        tenants: tenant_choices(&state).await?,
        roles: role_names(),
        form: &form,
    };
    Ok(Page::new("New user", view).for_session(&claims).render("admin/user_new")?)
}

fn new_user_from(form: &UserForm) -> Result<NewUser, ApiError> {
    Ok(NewUser {
        tenant_id: parse_uuid(&form.tenant_id, "tenant")?,
        branch_id: parse_optional_uuid(form.branch_id.as_deref(), "branch")?,
        email: form.email.clone(),
        display_name: form.display_name.clone(),
        password: form.password.clone(),
        role: parse_role(&form.role)?,
    })
}

pub async fn user_create(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Form(form): Form<UserForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    let actor = actor_id(&claims)?;

    let result = match new_user_from(&form) {
        Ok(input) => state.users.create_user(actor, input).await.map_err(ApiError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(user) => Ok(redirect_with_flash(&format!("/admin/users/{}", user.id), "user-created").into_response()),
        Err(err) => {
            let view = UserNewView {
                tenants: tenant_choices(&state).await?,
                roles: role_names(),
                form: &form,
            };
            rerender(Page::new("New user", view).for_session(&claims), "admin/user_new", err)
        }
    }
}

#[derive(Serialize)]
struct UserDetailView {
    user: User,
    tenant_name: String,
    branches: Vec<Branch>,
    roles: Vec<&'static str>,
    temporary_password: Option<String>,
}

async fn user_detail_page(
    state: &AppState,
    claims: &SessionClaims,
    id: &Uuid,
    flash: Option<&str>,
    error: Option<ApiError>,
    temporary_password: Option<String>,
) -> Result<Response, PageError> {
    let user = state.users.get_user(id).await?;
    let tenant = state.tenants.get_tenant(&user.tenant_id).await?;
    let view = UserDetailView {
        tenant_name: tenant.tenant.name,
        branches: tenant.branches,
        roles: role_names(),
        temporary_password,
        user,
    };
    let page = Page::new(view.user.display_name.clone(), view)
        .for_session(claims)
        .with_flash(flash);

    match error {
        Some(err) => rerender(page, "admin/user_detail", err),
        None => Ok(page.render("admin/user_detail")?.into_response()),
    }
}

pub async fn user_show(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<FlashQuery>,
) -> Result<Response, PageError> {
    user_detail_page(&state, &claims, &id, q.flash.as_deref(), None, None).await
}

#[derive(Debug, Deserialize)]
pub struct UserUpdateForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    pub display_name: String,
    pub role: String,
    #[serde(default)]
    pub branch_id: Option<String>,
}

async fn apply_user_update(state: &AppState, actor: Uuid, id: &Uuid, form: UserUpdateForm) -> Result<(), ApiError> {
    let input = UserUpdate {
        display_name: form.display_name,
        role: parse_role(&form.role)?,
        branch_id: parse_optional_uuid(form.branch_id.as_deref(), "branch")?,
    };
    state.users.update_user(actor, id, input).await?;
    Ok(())
}

pub async fn user_update(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<UserUpdateForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    match apply_user_update(&state, actor_id(&claims)?, &id, form).await {
        Ok(()) => Ok(redirect_with_flash(&format!("/admin/users/{}", id), "user-updated").into_response()),
        Err(err) => user_detail_page(&state, &claims, &id, None, Some(err), None).await,
    }
}

/// Shows the generated password on the response page itself; it never goes into a URL.
pub async fn user_reset_password(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    let temporary = state.users.reset_password(actor_id(&claims)?, &id).await?;
    user_detail_page(&state, &claims, &id, None, None, Some(temporary)).await
}

pub async fn api_user_active(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state.users.set_user_active(actor_id(&claims)?, &id, body.active).await?;
    Ok(Json(ApiResponse::success(user)))
}
