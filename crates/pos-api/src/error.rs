//! HTTP error taxonomy
//!
//! `ApiError` renders as the JSON envelope used by AJAX endpoints; wrapping it
//! in `PageError` renders the same error as an HTML alert page.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use pos_core::error::DomainError;

use crate::response::ApiResponse;
use crate::views;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Too many attempts, try again in a minute")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::TooManyRequests => "RATE_LIMITED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the client. Internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }

    fn log(&self) {
        match self {
            ApiError::Internal(msg) => error!("Internal error: {}", msg),
            ApiError::Unauthorized(msg) | ApiError::Forbidden(msg) => warn!("{}: {}", self.code(), msg),
            _ => {}
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::InvalidCredentials => ApiError::Unauthorized(message),

            DomainError::AccountNotActive
            | DomainError::TenantNotActive
            | DomainError::SubscriptionExpired
            | DomainError::CrossTenantAccess
            | DomainError::Forbidden(_) => ApiError::Forbidden(message),

            DomainError::TenantNotFound
            | DomainError::PlanNotFound(_)
            | DomainError::BranchNotFound
            | DomainError::UserNotFound
            | DomainError::ProductNotFound(_)
            | DomainError::TransferNotFound
            | DomainError::CustomerNotFound
            | DomainError::ProgramNotFound => ApiError::NotFound(message),

            DomainError::TenantSlugAlreadyExists(_)
            | DomainError::PlanCodeAlreadyExists(_)
            | DomainError::BranchCodeAlreadyExists(_)
            | DomainError::EmailAlreadyExists(_)
            | DomainError::InvalidTransition { .. }
            | DomainError::InsufficientStock { .. }
            | DomainError::InsufficientStamps { .. }
            | DomainError::ProgramClosed
            | DomainError::LimitReached(_) => ApiError::Conflict(message),

            DomainError::PasswordTooShort
            | DomainError::PasswordTooLong
            | DomainError::PasswordTooWeak
            | DomainError::ValidationError(_) => ApiError::Validation(message),

            DomainError::PasswordHashError(_) | DomainError::DatabaseError(_) | DomainError::InternalError(_) => {
                ApiError::Internal(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = ApiResponse::error(self.code(), &self.public_message());
        (self.status(), Json(body)).into_response()
    }
}

/// An `ApiError` rendered as an HTML page.
#[derive(Debug)]
pub struct PageError(pub ApiError);

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        PageError(err)
    }
}

impl From<DomainError> for PageError {
    fn from(err: DomainError) -> Self {
        PageError(err.into())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        self.0.log();
        views::error_page(self.0.status(), &self.0.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::domain::{TransferAction, TransferStatus};
    use uuid::Uuid;

    #[test]
    fn test_domain_errors_map_to_status() {
        let cases = [
            (DomainError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (DomainError::CrossTenantAccess, StatusCode::FORBIDDEN),
            (DomainError::TransferNotFound, StatusCode::NOT_FOUND),
            (
                DomainError::InvalidTransition {
                    from: TransferStatus::Received,
                    action: TransferAction::Cancel,
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::InsufficientStock {
                    product_id: Uuid::new_v4(),
                    branch_id: Uuid::new_v4(),
                },
                StatusCode::CONFLICT,
            ),
            (DomainError::PasswordTooWeak, StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::DatabaseError("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (domain, status) in cases {
            assert_eq!(ApiError::from(domain).status(), status);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(DomainError::DatabaseError("relation \"users\" does not exist".into()));
        assert!(!err.public_message().contains("users"));
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_transition_message_names_state_and_action() {
        let err = ApiError::from(DomainError::InvalidTransition {
            from: TransferStatus::Received,
            action: TransferAction::Cancel,
        });
        assert_eq!(err.public_message(), "Cannot cancel a received transfer");
    }
}
