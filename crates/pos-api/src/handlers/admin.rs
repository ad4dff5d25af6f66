//! Platform console: dashboard, tenants, branches and subscription plans

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pos_core::domain::{Branch, SubscriptionPlan, Tenant};
use pos_core::repositories::TenantFilter;
use pos_core::services::{NewBranch, NewPlan, NewTenant};
use pos_security::SessionClaims;

use crate::error::{ApiError, PageError};
use crate::handlers::{
    actor_id, non_empty, query_string, redirect_with_flash, rerender, verify_csrf, CsrfForm, FlashQuery, PageQuery,
    ToggleRequest,
};
use crate::middleware::RequireSuperAdmin;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::views::Page;

pub async fn dashboard(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Query(q): Query<FlashQuery>,
) -> Result<Html<String>, PageError> {
    #[derive(Serialize)]
    struct View {
        counts: pos_core::repositories::PlatformCounts,
    }

    let counts = state.tenants.dashboard().await?;
    Ok(Page::new("Dashboard", View { counts })
        .for_session(&claims)
        .with_flash(q.flash.as_deref())
        .render("admin/dashboard")?)
}

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TenantListQuery {
    pub q: Option<String>,
    pub active: Option<String>,
}

pub async fn tenants_index(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Query(filter): Query<TenantListQuery>,
    Query(page): Query<PageQuery>,
    Query(flash): Query<FlashQuery>,
) -> Result<Html<String>, PageError> {
    let search = non_empty(filter.q);
    let active = match filter.active.as_deref() {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    };

    let tenants = state
        .tenants
        .list_tenants(&TenantFilter { search: search.clone(), active }, page.pagination())
        .await?;

    let qs = query_string(&[("q", search.clone()), ("active", active.map(|a| a.to_string()))]);
    let data = serde_json::json!({
        "tenants": tenants,
        "search": search,
        "active": active,
        "qs": qs,
    });
    Ok(Page::new("Tenants", data)
        .for_session(&claims)
        .with_flash(flash.flash.as_deref())
        .render("admin/tenants")?)
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TenantForm {
    #[serde(rename = "_csrf", default, skip_serializing)]
    pub csrf: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub plan_code: String,
    #[serde(default)]
    pub subscription_days: Option<String>,
    pub owner_name: String,
    pub owner_email: String,
    #[serde(default, skip_serializing)]
    pub owner_password: String,
}

#[derive(Serialize)]
struct TenantNewView<'a> {
    plans: Vec<SubscriptionPlan>,
    form: &'a TenantForm,
}

pub async fn tenant_new_page(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let plans = state.tenants.list_plans(false).await?;
    let form = TenantForm::default();
    Ok(Page::new("New tenant", TenantNewView { plans, form: &form })
        .for_session(&claims)
        .render("admin/tenant_new")?)
}

fn parse_days(value: Option<String>) -> Result<Option<i64>, ApiError> {
    non_empty(value)
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| ApiError::Validation("Days must be a whole number".to_string()))
        })
        .transpose()
}

pub async fn tenant_create(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Form(form): Form<TenantForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    let actor = actor_id(&claims)?;

    let result = match parse_days(form.subscription_days.clone()) {
        Ok(subscription_days) => {
            let input = NewTenant {
                name: form.name.clone(),
                slug: non_empty(form.slug.clone()),
                plan_code: form.plan_code.clone(),
                subscription_days,
                owner_email: form.owner_email.clone(),
                owner_name: form.owner_name.clone(),
                owner_password: form.owner_password.clone(),
            };
            state.tenants.create_tenant(actor, input).await.map_err(ApiError::from)
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(tenant) => Ok(redirect_with_flash(&format!("/admin/tenants/{}", tenant.id), "tenant-created").into_response()),
        Err(err) => {
            let plans = state.tenants.list_plans(false).await?;
            let page = Page::new("New tenant", TenantNewView { plans, form: &form }).for_session(&claims);
            rerender(page, "admin/tenant_new", err)
        }
    }
}

#[derive(Serialize)]
struct TenantDetailView {
    detail: pos_core::services::TenantDetail,
    plans: Vec<SubscriptionPlan>,
}

/// The detail page, optionally carrying the error of a failed form post.
async fn tenant_detail_page(
    state: &AppState,
    claims: &SessionClaims,
    id: &Uuid,
    flash: Option<&str>,
    error: Option<ApiError>,
) -> Result<Response, PageError> {
    let detail = state.tenants.get_tenant(id).await?;
    let plans = state.tenants.list_plans(false).await?;
    let page = Page::new(detail.tenant.name.clone(), TenantDetailView { detail, plans })
        .for_session(claims)
        .with_flash(flash);

    match error {
        Some(err) => rerender(page, "admin/tenant_detail", err),
        None => Ok(page.render("admin/tenant_detail")?.into_response()),
    }
}

pub async fn tenant_show(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<FlashQuery>,
) -> Result<Response, PageError> {
    tenant_detail_page(&state, &claims, &id, q.flash.as_deref(), None).await
}

/// Result of a tenant form post: redirect with `flash` or re-render with the error.
async fn after_tenant_post(
    state: &AppState,
    claims: &SessionClaims,
    id: &Uuid,
    result: Result<(), ApiError>,
    flash: &str,
) -> Result<Response, PageError> {
    match result {
        Ok(()) => Ok(redirect_with_flash(&format!("/admin/tenants/{}", id), flash).into_response()),
        Err(err) => tenant_detail_page(state, claims, id, None, Some(err)).await,
    }
}

#[derive(Debug, Deserialize)]
pub struct TenantUpdateForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    pub name: String,
    #[serde(default)]
    pub extend_days: Option<String>,
}

async fn apply_tenant_update(
    state: &AppState,
    actor: Uuid,
    id: &Uuid,
    form: TenantUpdateForm,
) -> Result<(), ApiError> {
    let days = parse_days(form.extend_days)?;
    state.tenants.update_tenant(actor, id, form.name).await?;
    if let Some(days) = days {
        state.tenants.extend_subscription(actor, id, days).await?;
    }
    Ok(())
}

pub async fn tenant_update(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<TenantUpdateForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    let result = apply_tenant_update(&state, actor_id(&claims)?, &id, form).await;

    after_tenant_post(&state, &claims, &id, result, "tenant-updated").await
}

#[derive(Debug, Deserialize)]
pub struct PlanChangeForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    pub plan_code: String,
}

pub async fn tenant_change_plan(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<PlanChangeForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    let result = state
        .tenants
        .change_plan(actor_id(&claims)?, &id, &form.plan_code)
        .await
        .map(|_| ())
        .map_err(ApiError::from);

    after_tenant_post(&state, &claims, &id, result, "plan-changed").await
}

#[derive(Debug, Deserialize)]
pub struct BranchForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

pub async fn tenant_add_branch(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<BranchForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    let input = NewBranch {
        code: form.code,
        name: form.name,
        address: non_empty(form.address),
    };
    let result = state
        .branches
        .create_branch(&id, input)
        .await
        .map(|_| ())
        .map_err(ApiError::from);

    after_tenant_post(&state, &claims, &id, result, "branch-created").await
}

pub async fn tenant_update_branch(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path((id, branch_id)): Path<(Uuid, Uuid)>,
    Form(form): Form<BranchForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    let result = state
        .branches
        .update_branch(&id, &branch_id, form.name, non_empty(form.address))
        .await
        .map(|_| ())
        .map_err(ApiError::from);

    after_tenant_post(&state, &claims, &id, result, "branch-updated").await
}

pub async fn tenant_delete(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<CsrfForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    state.tenants.delete_tenant(actor_id(&claims)?, &id).await?;
    Ok(redirect_with_flash("/admin/tenants", "tenant-deleted").into_response())
}

// ---------------------------------------------------------------------------
// AJAX
// ---------------------------------------------------------------------------

pub async fn api_tenant_active(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ApiResponse<Tenant>>, ApiError> {
    let tenant = state.tenants.set_tenant_active(actor_id(&claims)?, &id, body.active).await?;
    Ok(Json(ApiResponse::success(tenant)))
}

pub async fn api_branch_active(
    RequireSuperAdmin(_claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ApiResponse<Branch>>, ApiError> {
    let branch = state.branches.set_branch_active(None, &id, body.active).await?;
    Ok(Json(ApiResponse::success(branch)))
}

pub async fn api_plan_active(
    RequireSuperAdmin(_claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ApiResponse<SubscriptionPlan>>, ApiError> {
    let plan = state.tenants.set_plan_active(&id, body.active).await?;
    Ok(Json(ApiResponse::success(plan)))
}

pub async fn api_tenant_branches(
    RequireSuperAdmin(_claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Branch>>>, ApiError> {
    let branches = state.branches.list_branches(&id).await?;
    Ok(Json(ApiResponse::success(branches)))
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PlansView {
    plans: Vec<SubscriptionPlan>,
}

async fn plans_page(
    state: &AppState,
    claims: &SessionClaims,
    flash: Option<&str>,
    error: Option<ApiError>,
) -> Result<Response, PageError> {
    let plans = state.tenants.list_plans(true).await?;
    let page = Page::new("Plans", PlansView { plans }).for_session(claims).with_flash(flash);
    match error {
        Some(err) => rerender(page, "admin/plans", err),
        None => Ok(page.render("admin/plans")?.into_response()),
    }
}

pub async fn plans_index(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Query(q): Query<FlashQuery>,
) -> Result<Response, PageError> {
    plans_page(&state, &claims, q.flash.as_deref(), None).await
}

#[derive(Debug, Deserialize)]
pub struct PlanForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    pub code: String,
    pub name: String,
    pub max_branches: i32,
    pub max_users: i32,
    pub monthly_price_cents: i64,
}

impl From<PlanForm> for NewPlan {
    fn from(form: PlanForm) -> Self {
        NewPlan {
            code: form.code,
            name: form.name,
            max_branches: form.max_branches,
            max_users: form.max_users,
            monthly_price_cents: form.monthly_price_cents,
        }
    }
}

pub async fn plan_create(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Form(form): Form<PlanForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    match state.tenants.create_plan(form.into()).await {
        Ok(_) => Ok(redirect_with_flash("/admin/plans", "plan-created").into_response()),
        Err(e) => plans_page(&state, &claims, None, Some(e.into())).await,
    }
}

pub async fn plan_update(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<PlanForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    match state.tenants.update_plan(&id, form.into()).await {
        Ok(_) => Ok(redirect_with_flash("/admin/plans", "plan-updated").into_response()),
        Err(e) => plans_page(&state, &claims, None, Some(e.into())).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days(None).unwrap(), None);
        assert_eq!(parse_days(Some(" ".into())).unwrap(), None);
        assert_eq!(parse_days(Some("30".into())).unwrap(), Some(30));
        assert!(matches!(parse_days(Some("a month".into())), Err(ApiError::Validation(_))));
    }
}
