// ============================================================================
// POS Infrastructure - PostgreSQL User Repository
// File: crates/pos-infrastructure/src/database/postgres/user_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgExecutor;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use pos_core::domain::{User, UserRole};
use pos_core::error::DomainError;
use pos_core::repositories::{UserFilter, UserRepository, UserSummary};
use pos_shared::{PageResult, Pagination};

use super::{db_error, unique_violation};

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct UserRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
    pub removed_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            tenant_id: row.tenant_id,
            branch_id: row.branch_id,
            email: row.email,
            display_name: row.display_name,
            password_hash: row.password_hash,
            role: UserRole::from_str(&row.role).unwrap_or_default(),
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
            removed_at: row.removed_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserSummaryRow {
    #[sqlx(flatten)]
    pub user: UserRow,
    pub tenant_name: String,
    pub branch_name: Option<String>,
}

const USER_COLUMNS: &str = r#"
    u.id, u.tenant_id, u.branch_id, u.email, u.display_name, u.password_hash,
    u.role, u.is_active, u.last_login_at,
    u.created_at, u.created_by, u.modified_at, u.modified_by, u.removed_at
"#;

/// `$1` tenant, `$2` role, `$3` search; all optional.
const USER_FILTER: &str = r#"
    u.removed_at IS NULL
    AND ($1::uuid IS NULL OR u.tenant_id = $1)
    AND ($2::text IS NULL OR u.role = $2)
    AND ($3::text IS NULL OR u.email ILIKE '%' || $3 || '%' OR u.display_name ILIKE '%' || $3 || '%')
"#;

/// Inserts on any executor so tenant onboarding can reuse it inside its transaction.
pub(crate) async fn insert_user<'e, E>(executor: E, user: &User) -> Result<User, DomainError>
where
    E: PgExecutor<'e>,
{
    let row: UserRow = sqlx::query_as(&format!(
        r#"
        INSERT INTO users AS u (
            id, tenant_id, branch_id, email, display_name, password_hash,
            role, is_active, created_at, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(user.tenant_id)
    .bind(user.branch_id)
    .bind(&user.email)
    .bind(&user.display_name)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(user.created_by)
    .fetch_one(executor)
    .await
    .map_err(|e| match unique_violation(&e) {
        Some(_) => DomainError::EmailAlreadyExists(user.email.clone()),
        None => db_error("creating user", e),
    })?;

    Ok(row.into())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1 AND u.removed_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("finding user by id", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE LOWER(u.email) = LOWER($1) AND u.removed_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("finding user by email", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self, filter: &UserFilter, page: Pagination) -> Result<PageResult<UserSummary>, DomainError> {
        let role = filter.role.map(|r| r.as_str());

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM users u WHERE {USER_FILTER}"))
            .bind(filter.tenant_id)
            .bind(role)
            .bind(&filter.search)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("counting users", e))?;

        let rows: Vec<UserSummaryRow> = sqlx::query_as(&format!(
            r#"
            SELECT {USER_COLUMNS},
                t.name AS tenant_name,
                b.name AS branch_name
            FROM users u
            JOIN tenants t ON t.id = u.tenant_id
            LEFT JOIN branches b ON b.id = u.branch_id
            WHERE {USER_FILTER}
            ORDER BY t.name, u.display_name
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.tenant_id)
        .bind(role)
        .bind(&filter.search)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing users", e))?;

        let items = rows
            .into_iter()
            .map(|r| UserSummary {
                user: r.user.into(),
                tenant_name: r.tenant_name,
                branch_name: r.branch_name,
            })
            .collect();
        Ok(PageResult::new(items, total, page))
    }

    async fn count_active_by_tenant(&self, tenant_id: &Uuid) -> Result<i64, DomainError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND is_active AND removed_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("counting active users", e))?;

        Ok(count)
    }

    async fn create(&self, user: &User) -> Result<User, DomainError> {
        let user = insert_user(&self.pool, user).await?;
        info!("User created successfully: {}", user.id);
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r#"
            UPDATE users u
            SET
                branch_id = $2,
                display_name = $3,
                password_hash = $4,
                role = $5,
                is_active = $6,
                last_login_at = $7,
                modified_at = $8,
                modified_by = $9,
                removed_at = $10
            WHERE u.id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(user.branch_id)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.last_login_at)
        .bind(user.modified_at)
        .bind(user.modified_by)
        .bind(user.removed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("updating user", e))?;

        row.map(Into::into).ok_or(DomainError::UserNotFound)
    }
}
