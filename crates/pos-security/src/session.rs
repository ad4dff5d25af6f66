//! Session tokens
//!
//! A session is a signed HS256 token kept in an HTTP-only cookie. It carries the
//! role information the page guards need, so no session table is consulted on
//! each request.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::csrf::generate_csrf_token;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Token creation failed: {0}")]
    CreationError(String),
    #[error("Token validation failed: {0}")]
    ValidationError(String),
    #[error("Session expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    SuperAdmin,
    TenantUser,
}

/// Who a session is being issued for.
#[derive(Debug, Clone)]
pub struct SessionSubject {
    pub id: Uuid,
    pub kind: SessionKind,
    pub name: String,
    pub tenant_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub kind: SessionKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub csrf: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> Result<Uuid, SessionError> {
        Uuid::parse_str(&self.sub).map_err(|e| SessionError::ValidationError(e.to_string()))
    }

    pub fn is_super_admin(&self) -> bool {
        self.kind == SessionKind::SuperAdmin
    }
}

pub struct SessionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl SessionTokenService {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn issue(&self, subject: &SessionSubject) -> Result<(String, SessionClaims), SessionError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: subject.id.to_string(),
            kind: subject.kind,
            name: subject.name.clone(),
            tenant_id: subject.tenant_id,
            branch_id: subject.branch_id,
            role: subject.role.clone(),
            csrf: generate_csrf_token(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.ttl_seconds)).timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| SessionError::CreationError(e.to_string()))?;

        Ok((token, claims))
    }

    pub fn validate(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::ValidationError(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SessionSubject {
        SessionSubject {
            id: Uuid::new_v4(),
            kind: SessionKind::TenantUser,
            name: "Sari".to_string(),
            tenant_id: Some(Uuid::new_v4()),
            branch_id: None,
            role: Some("manager".to_string()),
        }
    }

    #[test]
    fn test_issue_and_validate() {
        let service = SessionTokenService::new("secret", 3600);
        let subject = subject();
        let (token, issued) = service.issue(&subject).unwrap();

        let claims = service.validate(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), subject.id);
        assert_eq!(claims.tenant_id, subject.tenant_id);
        assert_eq!(claims.role.as_deref(), Some("manager"));
        assert_eq!(claims.csrf, issued.csrf);
        assert!(!claims.is_super_admin());
    }

    #[test]
    fn test_rejects_other_secret() {
        let (token, _) = SessionTokenService::new("secret", 3600).issue(&subject()).unwrap();
        let other = SessionTokenService::new("another-secret", 3600);
        assert!(matches!(other.validate(&token), Err(SessionError::ValidationError(_))));
    }

    #[test]
    fn test_rejects_expired() {
        let service = SessionTokenService::new("secret", -120);
        let (token, _) = service.issue(&subject()).unwrap();
        assert!(matches!(service.validate(&token), Err(SessionError::Expired)));
    }
}
