//! Application-wide constants

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_SESSION_COOKIE: &str = "pos_session";
pub const DEFAULT_SESSION_TTL: i64 = 28_800;
pub const CSRF_FORM_FIELD: &str = "_csrf";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const TEMP_PASSWORD_LENGTH: usize = 14;
pub const TRANSFER_REFERENCE_PREFIX: &str = "TRF";
