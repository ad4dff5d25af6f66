//! PostgreSQL branch repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use pos_core::domain::Branch;
use pos_core::error::DomainError;
use pos_core::repositories::BranchRepository;

use super::{db_error, unique_violation};

pub struct PgBranchRepository {
    pool: PgPool,
}

impl PgBranchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct BranchRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Branch {
            id: row.id,
            tenant_id: row.tenant_id,
            code: row.code,
            name: row.name,
            address: row.address,
            is_active: row.is_active,
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

const BRANCH_COLUMNS: &str = "id, tenant_id, code, name, address, is_active, created_at, modified_at";

#[async_trait]
impl BranchRepository for PgBranchRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Branch>, DomainError> {
        let row: Option<BranchRow> = sqlx::query_as(&format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("finding branch by id", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_code(&self, tenant_id: &Uuid, code: &str) -> Result<Option<Branch>, DomainError> {
        let row: Option<BranchRow> = sqlx::query_as(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE tenant_id = $1 AND code = UPPER($2)"
        ))
        .bind(tenant_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("finding branch by code", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_by_tenant(&self, tenant_id: &Uuid) -> Result<Vec<Branch>, DomainError> {
        let rows: Vec<BranchRow> = sqlx::query_as(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE tenant_id = $1 ORDER BY is_active DESC, code"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing branches", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Active branches only; inactive ones do not count against the plan.
    async fn count_by_tenant(&self, tenant_id: &Uuid) -> Result<i64, DomainError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM branches WHERE tenant_id = $1 AND is_active")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("counting branches", e))?;

        Ok(count)
    }

    async fn create(&self, branch: &Branch) -> Result<Branch, DomainError> {
        let row: BranchRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO branches (id, tenant_id, code, name, address, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {BRANCH_COLUMNS}
            "#
        ))
        .bind(branch.id)
        .bind(branch.tenant_id)
        .bind(&branch.code)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(branch.is_active)
        .bind(branch.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => DomainError::BranchCodeAlreadyExists(branch.code.clone()),
            None => db_error("creating branch", e),
        })?;

        Ok(row.into())
    }

    async fn update(&self, branch: &Branch) -> Result<Branch, DomainError> {
        let row: Option<BranchRow> = sqlx::query_as(&format!(
            r#"
            UPDATE branches
            SET name = $2, address = $3, is_active = $4, modified_at = $5
            WHERE id = $1
            RETURNING {BRANCH_COLUMNS}
            "#
        ))
        .bind(branch.id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(branch.is_active)
        .bind(branch.modified_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("updating branch", e))?;

        row.map(Into::into).ok_or(DomainError::BranchNotFound)
    }
}
