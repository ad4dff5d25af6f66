use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::error::{ApiError, PageError};
use crate::state::AppState;

/// Diagnostics are only served to allow-listed client addresses.
pub async fn diagnostics_guard(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, PageError> {
    let ip = addr.ip();

    if !state.allow_list.is_allowed(ip) {
        warn!("Diagnostics request from non-allowed IP: {}", ip);
        return Err(PageError(ApiError::Forbidden(format!(
            "Diagnostics are not available from {}",
            ip
        ))));
    }

    debug!("Diagnostics request from {} allowed", ip);
    Ok(next.run(request).await)
}
