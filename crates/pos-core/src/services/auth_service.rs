// ============================================================================
// POS Core - Authentication Service
// File: crates/pos-core/src/services/auth_service.rs
// ============================================================================
//! Sign-in for super admins and tenant users

use std::sync::Arc;
use tracing::{error, info, warn};

use pos_security::{PasswordService, SessionClaims, SessionKind, SessionSubject, SessionTokenService};
use pos_shared::utils::mask_email;

use crate::domain::SuperAdmin;
use crate::error::DomainError;
use crate::repositories::{SuperAdminRepository, TenantRepository, UserRepository};

/// Result of successful login
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: String,
    pub claims: SessionClaims,
}

pub struct AuthService {
    super_admins: Arc<dyn SuperAdminRepository>,
    users: Arc<dyn UserRepository>,
    tenants: Arc<dyn TenantRepository>,
    sessions: Arc<SessionTokenService>,
}

impl AuthService {
    pub fn new(
        super_admins: Arc<dyn SuperAdminRepository>,
        users: Arc<dyn UserRepository>,
        tenants: Arc<dyn TenantRepository>,
        sessions: Arc<SessionTokenService>,
    ) -> Self {
        Self {
            super_admins,
            users,
            tenants,
            sessions,
        }
    }

    /// Login to the platform console
    pub async fn login_super_admin(&self, email: &str, password: &str) -> Result<LoginResult, DomainError> {
        let masked = mask_email(email);
        info!("Super admin login attempt for: {}", masked);

        let mut admin = self
            .super_admins
            .find_by_email(email.trim())
            .await?
            .ok_or_else(|| {
                warn!("Super admin login failed: unknown email {}", masked);
                DomainError::InvalidCredentials
            })?;

        if !admin.can_login() {
            warn!("Super admin login failed: account disabled {}", masked);
            return Err(DomainError::AccountNotActive);
        }

        if !Self::verify_password(password, &admin.password_hash)? {
            warn!("Super admin login failed: invalid password for {}", masked);
            return Err(DomainError::InvalidCredentials);
        }

        if PasswordService::is_legacy_hash(&admin.password_hash) {
            admin.password_hash = PasswordService::hash(password)?;
        }
        admin.record_login();
        if let Err(e) = self.super_admins.update(&admin).await {
            error!("Failed to record super admin login: {}", e);
            // Don't fail login for this
        }

        let subject = SessionSubject {
            id: admin.id,
            kind: SessionKind::SuperAdmin,
            name: admin.display_name.clone(),
            tenant_id: None,
            branch_id: None,
            role: None,
        };
        self.issue(&subject, &masked)
    }

    /// Login to a tenant back-office. The tenant must be active with a current subscription.
    pub async fn login_tenant_user(&self, email: &str, password: &str) -> Result<LoginResult, DomainError> {
        let masked = mask_email(email);
        info!("Tenant user login attempt for: {}", masked);

        let mut user = self
            .users
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or_else(|| {
                warn!("Login failed: unknown email {}", masked);
                DomainError::InvalidCredentials
            })?;

        if !user.can_login() {
            warn!("Login failed: user cannot login {}", masked);
            return Err(DomainError::AccountNotActive);
        }

        if !Self::verify_password(password, &user.password_hash)? {
            warn!("Login failed: invalid password for {}", masked);
            return Err(DomainError::InvalidCredentials);
        }

        let tenant = self
            .tenants
            .find_by_id(&user.tenant_id)
            .await?
            .ok_or(DomainError::TenantNotFound)?;

        if !tenant.is_active || tenant.is_deleted() {
            warn!("Login refused: tenant {} is not active", tenant.slug);
            return Err(DomainError::TenantNotActive);
        }
        if !tenant.is_subscription_active() {
            warn!("Login refused: tenant {} subscription expired", tenant.slug);
            return Err(DomainError::SubscriptionExpired);
        }

        if PasswordService::is_legacy_hash(&user.password_hash) {
            let upgraded = PasswordService::hash(password)?;
            user.set_password_hash(upgraded, None);
        }
        user.record_login();
        if let Err(e) = self.users.update(&user).await {
            error!("Failed to update last login: {}", e);
        }

        let subject = SessionSubject {
            id: user.id,
            kind: SessionKind::TenantUser,
            name: user.display_name.clone(),
            tenant_id: Some(user.tenant_id),
            branch_id: user.branch_id,
            role: Some(user.role.as_str().to_string()),
        };
        self.issue(&subject, &masked)
    }

    /// Creates the first platform operator when no account with `email` exists.
    /// Returns `false` when the account was already there.
    pub async fn ensure_super_admin(&self, email: &str, password: &str) -> Result<bool, DomainError> {
        let email = email.trim().to_lowercase();
        if self.super_admins.find_by_email(&email).await?.is_some() {
            return Ok(false);
        }

        PasswordService::check_strength(password, &[&email])?;
        let hash = PasswordService::hash(password)?;
        let admin = SuperAdmin::new(email, "Platform Admin".to_string(), hash)?;
        self.super_admins.create(&admin).await?;
        info!("Bootstrap super admin created: {}", mask_email(&admin.email));
        Ok(true)
    }

    fn verify_password(password: &str, hash: &str) -> Result<bool, DomainError> {
        // An unparseable stored hash is treated as a credential failure, not a 500
        Ok(PasswordService::verify(password, hash).unwrap_or(false))
    }

    fn issue(&self, subject: &SessionSubject, masked: &str) -> Result<LoginResult, DomainError> {
        let (token, claims) = self
            .sessions
            .issue(subject)
            .map_err(|e| DomainError::InternalError(e.to_string()))?;
        info!("Login successful for: {}", masked);
        Ok(LoginResult { token, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Tenant, User, UserRole};
    use crate::repositories::{MockSuperAdminRepository, MockTenantRepository, MockUserRepository};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn sessions() -> Arc<SessionTokenService> {
        Arc::new(SessionTokenService::new("test-secret", 3600))
    }

    fn tenant_user(tenant_id: Uuid, password: &str) -> User {
        User::new(
            tenant_id,
            None,
            "manager@toko.id".into(),
            "Manager".into(),
            PasswordService::hash(password).unwrap(),
            UserRole::Manager,
            None,
        )
        .unwrap()
    }

    fn service(users: MockUserRepository, tenants: MockTenantRepository) -> AuthService {
        AuthService::new(
            Arc::new(MockSuperAdminRepository::new()),
            Arc::new(users),
            Arc::new(tenants),
            sessions(),
        )
    }

    #[tokio::test]
    async fn test_tenant_login_success() {
        let tenant = Tenant::new("Toko".into(), None, Uuid::new_v4(), None, None).unwrap();
        let user = tenant_user(tenant.id, "Sukses-Selalu-99");
        let user_id = user.id;

        let mut users = MockUserRepository::new();
        let found = user.clone();
        users.expect_find_by_email().returning(move |_| Ok(Some(found.clone())));
        users
            .expect_update()
            .withf(|u| u.last_login_at.is_some())
            .returning(|u| Ok(u.clone()));

        let mut tenants = MockTenantRepository::new();
        tenants.expect_find_by_id().returning(move |_| Ok(Some(tenant.clone())));

        let result = service(users, tenants)
            .login_tenant_user("Manager@Toko.id", "Sukses-Selalu-99")
            .await
            .unwrap();

        assert_eq!(result.claims.user_id().unwrap(), user_id);
        assert_eq!(result.claims.role.as_deref(), Some("manager"));
        assert_eq!(result.claims.kind, SessionKind::TenantUser);
    }

    #[tokio::test]
    async fn test_tenant_login_wrong_password() {
        let user = tenant_user(Uuid::new_v4(), "Sukses-Selalu-99");
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(move |_| Ok(Some(user.clone())));

        let err = service(users, MockTenantRepository::new())
            .login_tenant_user("manager@toko.id", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_tenant_login_unknown_email() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));

        let err = service(users, MockTenantRepository::new())
            .login_tenant_user("ghost@toko.id", "whatever")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_tenant_login_expired_subscription() {
        let tenant = Tenant::new(
            "Toko".into(),
            None,
            Uuid::new_v4(),
            Some(Utc::now() - Duration::days(2)),
            None,
        )
        .unwrap();
        let user = tenant_user(tenant.id, "Sukses-Selalu-99");

        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(move |_| Ok(Some(user.clone())));
        let mut tenants = MockTenantRepository::new();
        tenants.expect_find_by_id().returning(move |_| Ok(Some(tenant.clone())));

        let err = service(users, tenants)
            .login_tenant_user("manager@toko.id", "Sukses-Selalu-99")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SubscriptionExpired));
    }

    #[tokio::test]
    async fn test_super_admin_legacy_hash_is_upgraded() {
        let legacy = bcrypt_hash("Ops-Console-2024");
        let admin = SuperAdmin::new("ops@platform.id".into(), "Ops".into(), legacy).unwrap();

        let mut admins = MockSuperAdminRepository::new();
        admins.expect_find_by_email().returning(move |_| Ok(Some(admin.clone())));
        admins
            .expect_update()
            .withf(|a| a.password_hash.starts_with("$argon2"))
            .times(1)
            .returning(|a| Ok(a.clone()));

        let service = AuthService::new(
            Arc::new(admins),
            Arc::new(MockUserRepository::new()),
            Arc::new(MockTenantRepository::new()),
            sessions(),
        );

        let result = service.login_super_admin("ops@platform.id", "Ops-Console-2024").await.unwrap();
        assert!(result.claims.is_super_admin());
        assert!(result.claims.tenant_id.is_none());
    }

    #[tokio::test]
    async fn test_ensure_super_admin_only_creates_once() {
        let existing = SuperAdmin::new("ops@platform.id".into(), "Ops".into(), "x".into()).unwrap();

        let mut admins = MockSuperAdminRepository::new();
        admins
            .expect_find_by_email()
            .returning(move |email| Ok((email == "ops@platform.id").then(|| existing.clone())));
        admins
            .expect_create()
            .withf(|a| a.email == "root@platform.id" && a.password_hash.starts_with("$argon2"))
            .times(1)
            .returning(|a| Ok(a.clone()));

        let service = AuthService::new(
            Arc::new(admins),
            Arc::new(MockUserRepository::new()),
            Arc::new(MockTenantRepository::new()),
            sessions(),
        );

        assert!(!service.ensure_super_admin("ops@platform.id", "Ops-Console-2024").await.unwrap());
        assert!(service.ensure_super_admin(" Root@Platform.id ", "Tahan-Banting-7788").await.unwrap());
    }

    fn bcrypt_hash(password: &str) -> String {
        bcrypt::hash(password, 4).unwrap().replacen("$2b$", "$2y$", 1)
    }
}
