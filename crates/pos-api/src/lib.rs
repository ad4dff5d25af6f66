//! # POS API
//!
//! HTTP handlers, session extractors, middleware and server-rendered views.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod state;
pub mod views;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ApiError, PageError};
pub use router::build_router;
pub use state::AppState;
