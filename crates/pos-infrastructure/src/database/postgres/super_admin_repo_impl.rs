//! PostgreSQL super admin repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use pos_core::domain::SuperAdmin;
use pos_core::error::DomainError;
use pos_core::repositories::SuperAdminRepository;

use super::{db_error, unique_violation};

pub struct PgSuperAdminRepository {
    pool: PgPool,
}

impl PgSuperAdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SuperAdminRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<SuperAdminRow> for SuperAdmin {
    fn from(row: SuperAdminRow) -> Self {
        SuperAdmin {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            password_hash: row.password_hash,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
        }
    }
}

const ADMIN_COLUMNS: &str = "id, email, display_name, password_hash, is_active, last_login_at, created_at";

#[async_trait]
impl SuperAdminRepository for PgSuperAdminRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<SuperAdmin>, DomainError> {
        let row: Option<SuperAdminRow> = sqlx::query_as(&format!(
            "SELECT {ADMIN_COLUMNS} FROM super_admins WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("finding super admin by email", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn create(&self, admin: &SuperAdmin) -> Result<SuperAdmin, DomainError> {
        let row: SuperAdminRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO super_admins (id, email, display_name, password_hash, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ADMIN_COLUMNS}
            "#
        ))
        .bind(admin.id)
        .bind(&admin.email)
        .bind(&admin.display_name)
        .bind(&admin.password_hash)
        .bind(admin.is_active)
        .bind(admin.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => DomainError::EmailAlreadyExists(admin.email.clone()),
            None => db_error("creating super admin", e),
        })?;

        info!("Super admin created: {}", row.id);
        Ok(row.into())
    }

    async fn update(&self, admin: &SuperAdmin) -> Result<SuperAdmin, DomainError> {
        let row: SuperAdminRow = sqlx::query_as(&format!(
            r#"
            UPDATE super_admins
            SET display_name = $2, password_hash = $3, is_active = $4, last_login_at = $5
            WHERE id = $1
            RETURNING {ADMIN_COLUMNS}
            "#
        ))
        .bind(admin.id)
        .bind(&admin.display_name)
        .bind(&admin.password_hash)
        .bind(admin.is_active)
        .bind(admin.last_login_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("updating super admin", e))?;

        Ok(row.into())
    }
}
