//! # POS Security
//! 
//! Security utilities: password hashing, session tokens, CSRF, IP allow-list.

pub mod password;
pub mod session;
pub mod csrf;
pub mod ip_allowlist;

pub use password::{PasswordError, PasswordService};
pub use session::{SessionClaims, SessionError, SessionKind, SessionSubject, SessionTokenService};
pub use ip_allowlist::IpAllowList;
