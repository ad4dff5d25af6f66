//! Tenant back-office: inter-branch stock transfers

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use pos_core::domain::{StockTransfer, TransferStatus};
use pos_core::repositories::TransferFilter;
use pos_core::services::{NewTransfer, TransferOptions};
use pos_shared::constants::CSRF_FORM_FIELD;

use crate::error::{ApiError, PageError};
use crate::handlers::{
    non_empty, parse_optional_uuid, parse_uuid, query_string, redirect_with_flash, rerender, verify_csrf, FlashQuery,
    PageQuery,
};
use crate::middleware::RequireTenantUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::views::Page;

const QTY_PREFIX: &str = "qty_";

#[derive(Debug, Default, Deserialize)]
pub struct TransferListQuery {
    pub status: Option<String>,
    pub branch: Option<String>,
}

pub async fn index(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Query(filter): Query<TransferListQuery>,
    Query(page): Query<PageQuery>,
    Query(flash): Query<FlashQuery>,
) -> Result<Html<String>, PageError> {
    let status = match non_empty(filter.status) {
        Some(s) => Some(
            TransferStatus::from_str(&s).ok_or_else(|| ApiError::BadRequest(format!("Unknown status '{}'", s)))?,
        ),
        None => None,
    };
    let branch_id = parse_optional_uuid(filter.branch.as_deref(), "branch")?;

    let transfers = state
        .stockflow
        .list_transfers(&actor, TransferFilter { status, branch_id }, page.pagination())
        .await?;
    let branches = state.stockflow.list_branches(&actor).await?;

    let qs = query_string(&[
        ("status", status.map(|s| s.as_str().to_string())),
        ("branch", branch_id.map(|b| b.to_string())),
    ]);
    let statuses: Vec<&str> = TransferStatus::ALL.iter().map(|s| s.as_str()).collect();
    let data = serde_json::json!({
        "transfers": transfers,
        "branches": branches,
        "statuses": statuses,
        "status": status,
        "branch_id": branch_id,
        "qs": qs,
        "can_create": actor.role.can_manage_stockflow(),
    });
    Ok(Page::new("Transfers", data)
        .for_session(&claims)
        .with_flash(flash.flash.as_deref())
        .render("stockflow/index")?)
}

/// Values echoed back into the form after a failed submit.
#[derive(Debug, Default, Serialize)]
struct TransferFormEcho {
    from_branch_id: String,
    to_branch_id: String,
    notes: String,
}

#[derive(Serialize)]
struct NewTransferView {
    options: TransferOptions,
    form: TransferFormEcho,
}

pub async fn new_page(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let options = state.stockflow.creation_options(&actor).await?;
    let view = NewTransferView {
        options,
        form: TransferFormEcho::default(),
    };
    Ok(Page::new("New transfer", view).for_session(&claims).render("stockflow/new")?)
}

/// Builds the transfer from the submitted fields. Product quantities arrive as
/// `qty_<product id>`; blank and zero quantities are left out.
fn parse_transfer_form(fields: &HashMap<String, String>) -> Result<NewTransfer, ApiError> {
    let field = |name: &str| fields.get(name).map(String::as_str).unwrap_or_default();

    let mut lines = Vec::new();
    for (key, value) in fields {
        let Some(product) = key.strip_prefix(QTY_PREFIX) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let quantity: i32 = value
            .parse()
            .map_err(|_| ApiError::Validation(format!("Quantity '{}' is not a whole number", value)))?;
        if quantity == 0 {
            continue;
        }
        lines.push((parse_uuid(product, "product")?, quantity));
    }
    lines.sort_by_key(|(product, _)| *product);

    Ok(NewTransfer {
        from_branch_id: parse_uuid(field("from_branch_id"), "source branch")?,
        to_branch_id: parse_uuid(field("to_branch_id"), "destination branch")?,
        lines,
        notes: non_empty(fields.get("notes").cloned()),
    })
}

pub async fn create(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Response, PageError> {
    let token = fields.get(CSRF_FORM_FIELD).map(String::as_str).unwrap_or_default();
    verify_csrf(&claims, token)?;

    let result = match parse_transfer_form(&fields) {
        Ok(input) => state.stockflow.create_transfer(&actor, input).await.map_err(ApiError::from),
        Err(e) => Err(e),
    };

    match result {
        Ok(transfer) => {
            Ok(redirect_with_flash(&format!("/stockflow/{}", transfer.id), "transfer-created").into_response())
        }
        Err(err) => {
            let options = state.stockflow.creation_options(&actor).await?;
            let echo = |name: &str| fields.get(name).cloned().unwrap_or_default();
            let view = NewTransferView {
                options,
                form: TransferFormEcho {
                    from_branch_id: echo("from_branch_id"),
                    to_branch_id: echo("to_branch_id"),
                    notes: echo("notes"),
                },
            };
            rerender(Page::new("New transfer", view).for_session(&claims), "stockflow/new", err)
        }
    }
}

pub async fn show(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<FlashQuery>,
) -> Result<Html<String>, PageError> {
    let detail = state.stockflow.transfer_detail(&actor, &id).await?;
    let title = detail.transfer.reference.clone();
    Ok(Page::new(title, serde_json::json!({ "detail": detail }))
        .for_session(&claims)
        .with_flash(q.flash.as_deref())
        .render("stockflow/detail")?)
}

#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    pub branch: Option<String>,
}

/// Without `?branch=` the user's own branch is shown, else the first active one.
pub async fn stock(
    RequireTenantUser { claims, actor }: RequireTenantUser,
    State(state): State<AppState>,
    Query(q): Query<StockQuery>,
) -> Result<Html<String>, PageError> {
    let branches = state.stockflow.list_branches(&actor).await?;
    let requested = parse_optional_uuid(q.branch.as_deref(), "branch")?;

    let branch = requested
        .or(actor.branch_id)
        .and_then(|id| branches.iter().find(|b| b.id == id))
        .or_else(|| branches.iter().find(|b| b.is_active))
        .cloned();

    let levels = match &branch {
        Some(b) => state.stockflow.branch_stock(&actor, &b.id).await?,
        None => Vec::new(),
    };

    let title = branch.as_ref().map(|b| b.name.clone()).unwrap_or_else(|| "Stock".to_string());
    let data = serde_json::json!({
        "branch": branch,
        "branches": branches,
        "levels": levels,
    });
    Ok(Page::new(title, data).for_session(&claims).render("stockflow/stock")?)
}

// ---------------------------------------------------------------------------
// AJAX transitions
// ---------------------------------------------------------------------------

fn transfer_response(transfer: StockTransfer) -> Json<ApiResponse<StockTransfer>> {
    Json(ApiResponse::success(transfer))
}

pub async fn api_ship(
    RequireTenantUser { actor, .. }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<StockTransfer>>, ApiError> {
    Ok(transfer_response(state.stockflow.ship(&actor, &id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReceivedItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Items left out are received in full.
#[derive(Debug, Default, Deserialize)]
pub struct ReceiveRequest {
    #[serde(default)]
    pub items: Vec<ReceivedItem>,
}

pub async fn api_receive(
    RequireTenantUser { actor, .. }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReceiveRequest>,
) -> Result<Json<ApiResponse<StockTransfer>>, ApiError> {
    let received: Vec<(Uuid, i32)> = body.items.iter().map(|i| (i.product_id, i.quantity)).collect();
    debug!("Receiving transfer {} with {} explicit quantities", id, received.len());
    Ok(transfer_response(state.stockflow.receive(&actor, &id, &received).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn api_cancel(
    RequireTenantUser { actor, .. }: RequireTenantUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<ApiResponse<StockTransfer>>, ApiError> {
    Ok(transfer_response(state.stockflow.cancel(&actor, &id, non_empty(body.reason)).await?))
}
