//! # POS Shared
//! 
//! Shared configuration, telemetry, paging types and helpers for the POS back-office.

pub mod constants;
pub mod types;
pub mod utils;
pub mod telemetry;
pub mod config;
pub mod error;

pub use types::*;
pub use error::AppError;
