//! PostgreSQL subscription plan repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use pos_core::domain::SubscriptionPlan;
use pos_core::error::DomainError;
use pos_core::repositories::{PlanRepository, PlanUsage};

use super::{db_error, unique_violation};

pub struct PgPlanRepository {
    pool: PgPool,
}

impl PgPlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct PlanRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub max_branches: i32,
    pub max_users: i32,
    pub monthly_price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl From<PlanRow> for SubscriptionPlan {
    fn from(row: PlanRow) -> Self {
        SubscriptionPlan {
            id: row.id,
            code: row.code,
            name: row.name,
            max_branches: row.max_branches,
            max_users: row.max_users,
            monthly_price_cents: row.monthly_price_cents,
            is_active: row.is_active,
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

const PLAN_COLUMNS: &str =
    "id, code, name, max_branches, max_users, monthly_price_cents, is_active, created_at, modified_at";

#[async_trait]
impl PlanRepository for PgPlanRepository {
    async fn list(&self, include_inactive: bool) -> Result<Vec<SubscriptionPlan>, DomainError> {
        let rows: Vec<PlanRow> = sqlx::query_as(&format!(
            "SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE ($1 OR is_active) ORDER BY monthly_price_cents, code"
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing plans", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<SubscriptionPlan>, DomainError> {
        let row: Option<PlanRow> =
            sqlx::query_as(&format!("SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("finding plan by id", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<SubscriptionPlan>, DomainError> {
        let row: Option<PlanRow> =
            sqlx::query_as(&format!("SELECT {PLAN_COLUMNS} FROM subscription_plans WHERE code = $1"))
                .bind(code)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("finding plan by code", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn create(&self, plan: &SubscriptionPlan) -> Result<SubscriptionPlan, DomainError> {
        let row: PlanRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO subscription_plans (
                id, code, name, max_branches, max_users, monthly_price_cents, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(plan.id)
        .bind(&plan.code)
        .bind(&plan.name)
        .bind(plan.max_branches)
        .bind(plan.max_users)
        .bind(plan.monthly_price_cents)
        .bind(plan.is_active)
        .bind(plan.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => DomainError::PlanCodeAlreadyExists(plan.code.clone()),
            None => db_error("creating plan", e),
        })?;

        Ok(row.into())
    }

    async fn update(&self, plan: &SubscriptionPlan) -> Result<SubscriptionPlan, DomainError> {
        let row: Option<PlanRow> = sqlx::query_as(&format!(
            r#"
            UPDATE subscription_plans
            SET
                name = $2,
                max_branches = $3,
                max_users = $4,
                monthly_price_cents = $5,
                is_active = $6,
                modified_at = $7
            WHERE id = $1
            RETURNING {PLAN_COLUMNS}
            "#
        ))
        .bind(plan.id)
        .bind(&plan.name)
        .bind(plan.max_branches)
        .bind(plan.max_users)
        .bind(plan.monthly_price_cents)
        .bind(plan.is_active)
        .bind(plan.modified_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("updating plan", e))?;

        row.map(Into::into)
            .ok_or_else(|| DomainError::PlanNotFound(plan.id.to_string()))
    }

    async fn peak_usage(&self, plan_id: &Uuid) -> Result<PlanUsage, DomainError> {
        let (max_active_users, max_active_branches): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(MAX(u.n), 0)::BIGINT,
                COALESCE(MAX(b.n), 0)::BIGINT
            FROM tenants t
            LEFT JOIN LATERAL (
                SELECT COUNT(*) AS n FROM users
                WHERE tenant_id = t.id AND is_active AND removed_at IS NULL
            ) u ON TRUE
            LEFT JOIN LATERAL (
                SELECT COUNT(*) AS n FROM branches
                WHERE tenant_id = t.id AND is_active
            ) b ON TRUE
            WHERE t.plan_id = $1 AND t.removed_at IS NULL
            "#,
        )
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("measuring plan usage", e))?;

        Ok(PlanUsage {
            max_active_users,
            max_active_branches,
        })
    }
}
