//! Tenant back-office: stamp programs, customer cards and customers

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pos_core::domain::{Customer, LoyaltyProgram, StampCard, TenantActor};
use pos_core::services::{NewProgram, ProgramOverview};
use pos_security::SessionClaims;
use pos_shared::constants::MAX_PAGE_SIZE;
use pos_shared::{PageResult, Pagination};

use crate::error::{ApiError, PageError};
use crate::handlers::{
    non_empty, query_string, redirect_with_flash, rerender, verify_csrf, FlashQuery, PageQuery, ToggleRequest,
};
use crate::middleware::RequireTenantUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::views::Page;

fn require_manager(actor: &TenantActor) -> Result<(), ApiError> {
    if actor.role.can_manage_loyalty() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Owner or manager role required".to_string()))
    }
}

/// `YYYY-MM-DD` from a date input, valid through the end of that day (UTC).
fn parse_valid_until(value: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(value) = non_empty(value) else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation(format!("'{}' is not a date", value)))?;
    Ok(date.and_hms_opt(23, 59, 59).map(|d| d.and_utc()))
}

pub async fn programs(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Query(q): Query<FlashQuery>,
) -> Result<Html<String>, PageError> {
    #[derive(Serialize)]
    struct View {
        programs: Vec<LoyaltyProgram>,
        can_manage: bool,
    }

    let programs = state.loyalty.list_programs(&actor).await?;
    let view = View {
        programs,
        can_manage: actor.role.can_manage_loyalty(),
    };
    Ok(Page::new("Loyalty programs", view)
        .for_session(&claims)
        .with_flash(q.flash.as_deref())
        .render("loyalty/programs")?)
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProgramForm {
    #[serde(rename = "_csrf", default, skip_serializing)]
    pub csrf: String,
    pub name: String,
    pub stamps_required: String,
    pub reward_description: String,
    #[serde(default)]
    pub valid_until: Option<String>,
}

impl ProgramForm {
    fn to_input(&self) -> Result<NewProgram, ApiError> {
        let stamps_required = self
            .stamps_required
            .trim()
            .parse()
            .map_err(|_| ApiError::Validation("Stamps required must be a whole number".to_string()))?;
        Ok(NewProgram {
            name: self.name.clone(),
            stamps_required,
            reward_description: self.reward_description.clone(),
            valid_until: parse_valid_until(self.valid_until.clone())?,
        })
    }
}

#[derive(Serialize)]
struct ProgramNewView<'a> {
    form: &'a ProgramForm,
}

pub async fn program_new_page(
    RequireTenantUser { claims, actor }: RequireTenantUser,
) -> Result<Html<String>, PageError> {
    require_manager(&actor)?;
    let form = ProgramForm {
        stamps_required: "10".to_string(),
        ..ProgramForm::default()
    };
    Ok(Page::new("New program", ProgramNewView { form: &form })
        .for_session(&claims)
        .render("loyalty/program_new")?)
}

pub async fn program_create(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Form(form): Form<ProgramForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;

    let result = match form.to_input() {
        Ok(input) => state.loyalty.create_program(&actor, input).await.map_err(ApiError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(program) => {
            Ok(redirect_with_flash(&format!("/loyalty/programs/{}", program.id), "program-created").into_response())
        }
        Err(err) => rerender(
            Page::new("New program", ProgramNewView { form: &form }).for_session(&claims),
            "loyalty/program_new",
            err,
        ),
    }
}

#[derive(Serialize)]
struct ProgramDetailView {
    overview: ProgramOverview,
    customers: PageResult<Customer>,
}

async fn program_detail_page(
    state: &AppState,
    claims: &SessionClaims,
    actor: &TenantActor,
    id: &Uuid,
    page: Pagination,
    flash: Option<&str>,
    error: Option<ApiError>,
) -> Result<Response, PageError> {
    let overview = state.loyalty.program_overview(actor, id, page).await?;
    let customers = state
        .loyalty
        .list_customers(actor, None, Pagination::new(1, MAX_PAGE_SIZE))
        .await?;
    let title = overview.program.name.clone();
    let page = Page::new(title, ProgramDetailView { overview, customers })
        .for_session(claims)
        .with_flash(flash);

    match error {
        Some(err) => rerender(page, "loyalty/program_detail", err),
        None => Ok(page.render("loyalty/program_detail")?.into_response()),
    }
}

pub async fn program_show(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
    Query(q): Query<FlashQuery>,
) -> Result<Response, PageError> {
    program_detail_page(&state, &claims, &actor, &id, page.pagination(), q.flash.as_deref(), None).await
}

pub async fn program_update(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<ProgramForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;

    let result = match form.to_input() {
        Ok(input) => state.loyalty.update_program(&actor, &id, input).await.map_err(ApiError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(redirect_with_flash(&format!("/loyalty/programs/{}", id), "program-updated").into_response()),
        Err(err) => program_detail_page(&state, &claims, &actor, &id, Pagination::default(), None, Some(err)).await,
    }
}

// ---------------------------------------------------------------------------
// AJAX
// ---------------------------------------------------------------------------

pub async fn api_program_active(
    RequireTenantUser { actor, .. }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ApiResponse<LoyaltyProgram>>, ApiError> {
    let program = state.loyalty.set_program_active(&actor, &id, body.active).await?;
    Ok(Json(ApiResponse::success(program)))
}

/// Card plus the reward figures the stamp panel shows.
#[derive(Debug, Serialize)]
pub struct CardView {
    #[serde(flatten)]
    pub card: StampCard,
    pub rewards_available: i64,
    pub stamps_to_next_reward: i64,
}

impl From<StampCard> for CardView {
    fn from(card: StampCard) -> Self {
        Self {
            rewards_available: card.rewards_available(),
            stamps_to_next_reward: card.stamps_to_next_reward(),
            card,
        }
    }
}

fn card_response(card: StampCard) -> Json<ApiResponse<CardView>> {
    Json(ApiResponse::success(card.into()))
}

pub async fn api_card(
    RequireTenantUser { actor, .. }: RequireTenantUser,
    State(state): State<AppState>,
    Path((program_id, customer_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<CardView>>, ApiError> {
    Ok(card_response(state.loyalty.stamp_card(&actor, &program_id, &customer_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StampRequest {
    pub customer_id: Uuid,
    #[serde(default)]
    pub stamps: i32,
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn api_earn(
    RequireTenantUser { actor, .. }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StampRequest>,
) -> Result<Json<ApiResponse<CardView>>, ApiError> {
    let card = state
        .loyalty
        .earn_stamps(&actor, &id, &body.customer_id, body.stamps, non_empty(body.note))
        .await?;
    Ok(card_response(card))
}

/// `stamps` is ignored; a redemption always costs one full card.
pub async fn api_redeem(
    RequireTenantUser { actor, .. }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StampRequest>,
) -> Result<Json<ApiResponse<CardView>>, ApiError> {
    let card = state
        .loyalty
        .redeem_reward(&actor, &id, &body.customer_id, non_empty(body.note))
        .await?;
    Ok(card_response(card))
}

pub async fn api_adjust(
    RequireTenantUser { actor, .. }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StampRequest>,
) -> Result<Json<ApiResponse<CardView>>, ApiError> {
    let card = state
        .loyalty
        .adjust_stamps(&actor, &id, &body.customer_id, body.stamps, non_empty(body.note))
        .await?;
    Ok(card_response(card))
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub q: Option<String>,
}

async fn customers_page(
    state: &AppState,
    claims: &SessionClaims,
    actor: &TenantActor,
    search: Option<String>,
    page: Pagination,
    flash: Option<&str>,
    error: Option<ApiError>,
) -> Result<Response, PageError> {
    let search = non_empty(search);
    let customers = state.loyalty.list_customers(actor, search.clone(), page).await?;
    let data = serde_json::json!({
        "customers": customers,
        "qs": query_string(&[("q", search.clone())]),
        "search": search,
    });
    let page = Page::new("Customers", data).for_session(claims).with_flash(flash);
    match error {
        Some(err) => rerender(page, "loyalty/customers", err),
        None => Ok(page.render("loyalty/customers")?.into_response()),
    }
}

pub async fn customers(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Query(filter): Query<CustomerQuery>,
    Query(page): Query<PageQuery>,
    Query(flash): Query<FlashQuery>,
) -> Result<Response, PageError> {
    customers_page(
        &state,
        &claims,
        &actor,
        filter.q,
        page.pagination(),
        flash.flash.as_deref(),
        None,
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct CustomerForm {
    #[serde(rename = "_csrf", default)]
    pub csrf: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

pub async fn customer_create(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Form(form): Form<CustomerForm>,
) -> Result<Response, PageError> {
    verify_csrf(&claims, &form.csrf)?;
    match state
        .loyalty
        .create_customer(&actor, form.name, form.phone, form.email)
        .await
    {
        Ok(_) => Ok(redirect_with_flash("/loyalty/customers", "customer-created").into_response()),
        Err(e) => customers_page(&state, &claims, &actor, None, Pagination::default(), None, Some(e.into())).await,
    }
}
