// ============================================================================
// POS Infrastructure - PostgreSQL Tenant Repository
// File: crates/pos-infrastructure/src/database/postgres/tenant_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use pos_core::domain::{Tenant, User};
use pos_core::error::DomainError;
use pos_core::repositories::{PlatformCounts, TenantFilter, TenantRepository, TenantSummary};
use pos_shared::{PageResult, Pagination};

use super::user_repo_impl::insert_user;
use super::{db_error, unique_violation};

pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct TenantRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan_id: Uuid,
    pub is_active: bool,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modified_by: Option<Uuid>,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<Uuid>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Tenant {
            id: row.id,
            name: row.name,
            slug: row.slug,
            plan_id: row.plan_id,
            is_active: row.is_active,
            subscription_expires_at: row.subscription_expires_at,
            created_at: row.created_at,
            created_by: row.created_by,
            modified_at: row.modified_at,
            modified_by: row.modified_by,
            removed_at: row.removed_at,
            removed_by: row.removed_by,
        }
    }
}

#[derive(Debug, FromRow)]
struct TenantSummaryRow {
    #[sqlx(flatten)]
    pub tenant: TenantRow,
    pub plan_code: String,
    pub plan_name: String,
    pub user_count: i64,
    pub branch_count: i64,
}

impl From<TenantSummaryRow> for TenantSummary {
    fn from(row: TenantSummaryRow) -> Self {
        TenantSummary {
            tenant: row.tenant.into(),
            plan_code: row.plan_code,
            plan_name: row.plan_name,
            user_count: row.user_count,
            branch_count: row.branch_count,
        }
    }
}

const TENANT_COLUMNS: &str = r#"
    t.id, t.name, t.slug, t.plan_id, t.is_active, t.subscription_expires_at,
    t.created_at, t.created_by, t.modified_at, t.modified_by, t.removed_at, t.removed_by
"#;

/// `$1` search text, `$2` active flag; both optional.
const TENANT_FILTER: &str = r#"
    t.removed_at IS NULL
    AND ($1::text IS NULL OR t.name ILIKE '%' || $1 || '%' OR t.slug ILIKE '%' || $1 || '%')
    AND ($2::bool IS NULL OR t.is_active = $2)
"#;

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Tenant>, DomainError> {
        let row: Option<TenantRow> =
            sqlx::query_as(&format!("SELECT {TENANT_COLUMNS} FROM tenants t WHERE t.id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("finding tenant by id", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, DomainError> {
        let row: Option<TenantRow> =
            sqlx::query_as(&format!("SELECT {TENANT_COLUMNS} FROM tenants t WHERE LOWER(t.slug) = LOWER($1)"))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("finding tenant by slug", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self, filter: &TenantFilter, page: Pagination) -> Result<PageResult<TenantSummary>, DomainError> {
        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM tenants t WHERE {TENANT_FILTER}"))
            .bind(&filter.search)
            .bind(filter.active)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("counting tenants", e))?;

        let rows: Vec<TenantSummaryRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TENANT_COLUMNS},
                p.code AS plan_code,
                p.name AS plan_name,
                (SELECT COUNT(*) FROM users u
                  WHERE u.tenant_id = t.id AND u.removed_at IS NULL AND u.is_active) AS user_count,
                (SELECT COUNT(*) FROM branches b
                  WHERE b.tenant_id = t.id AND b.is_active) AS branch_count
            FROM tenants t
            JOIN subscription_plans p ON p.id = t.plan_id
            WHERE {TENANT_FILTER}
            ORDER BY t.created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(&filter.search)
        .bind(filter.active)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing tenants", e))?;

        Ok(PageResult::new(rows.into_iter().map(Into::into).collect(), total, page))
    }

    async fn create_with_owner(&self, tenant: &Tenant, owner: &User) -> Result<Tenant, DomainError> {
        info!("Creating tenant {} with owner", tenant.slug);

        let mut tx = self.pool.begin().await.map_err(|e| db_error("starting transaction", e))?;

        let row: TenantRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO tenants AS t (
                id, name, slug, plan_id, is_active, subscription_expires_at,
                created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {TENANT_COLUMNS}
            "#
        ))
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(tenant.plan_id)
        .bind(tenant.is_active)
        .bind(tenant.subscription_expires_at)
        .bind(tenant.created_at)
        .bind(tenant.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => DomainError::TenantSlugAlreadyExists(tenant.slug.clone()),
            None => db_error("creating tenant", e),
        })?;

        insert_user(&mut *tx, owner).await?;

        tx.commit().await.map_err(|e| db_error("committing tenant", e))?;

        info!("Tenant created successfully: {}", row.id);
        Ok(row.into())
    }

    async fn update(&self, tenant: &Tenant) -> Result<Tenant, DomainError> {
        let row: Option<TenantRow> = sqlx::query_as(&format!(
            r#"
            UPDATE tenants t
            SET
                name = $2,
                plan_id = $3,
                is_active = $4,
                subscription_expires_at = $5,
                modified_at = $6,
                modified_by = $7,
                removed_at = $8,
                removed_by = $9
            WHERE t.id = $1
            RETURNING {TENANT_COLUMNS}
            "#
        ))
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(tenant.plan_id)
        .bind(tenant.is_active)
        .bind(tenant.subscription_expires_at)
        .bind(tenant.modified_at)
        .bind(tenant.modified_by)
        .bind(tenant.removed_at)
        .bind(tenant.removed_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("updating tenant", e))?;

        row.map(Into::into).ok_or(DomainError::TenantNotFound)
    }

    async fn platform_counts(&self) -> Result<PlatformCounts, DomainError> {
        let (tenants, active_tenants, users, branches, open_transfers): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM tenants WHERE removed_at IS NULL),
                    (SELECT COUNT(*) FROM tenants WHERE removed_at IS NULL AND is_active),
                    (SELECT COUNT(*) FROM users WHERE removed_at IS NULL AND is_active),
                    (SELECT COUNT(*) FROM branches WHERE is_active),
                    (SELECT COUNT(*) FROM stockflow_transfers WHERE status IN ('pending', 'shipped'))
                "#,
            )
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("counting platform totals", e))?;

        Ok(PlatformCounts {
            tenants,
            active_tenants,
            users,
            branches,
            open_transfers,
        })
    }
}
