// ============================================================================
// POS Infrastructure - PostgreSQL Loyalty Repository
// File: crates/pos-infrastructure/src/database/postgres/loyalty_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use pos_core::domain::{EntryType, LoyaltyEntry, LoyaltyProgram};
use pos_core::error::DomainError;
use pos_core::repositories::{LedgerLine, LoyaltyRepository, MemberBalance};
use pos_shared::{PageResult, Pagination};

use super::db_error;

pub struct PgLoyaltyRepository {
    pool: PgPool,
}

impl PgLoyaltyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ProgramRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub stamps_required: i32,
    pub reward_description: String,
    pub is_active: bool,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl From<ProgramRow> for LoyaltyProgram {
    fn from(row: ProgramRow) -> Self {
        LoyaltyProgram {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            stamps_required: row.stamps_required,
            reward_description: row.reward_description,
            is_active: row.is_active,
            valid_until: row.valid_until,
            created_at: row.created_at,
            modified_at: row.modified_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LedgerLineRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub entry_type: String,
    pub stamps: i32,
    pub note: Option<String>,
    pub created_by_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerLineRow> for LedgerLine {
    fn from(row: LedgerLineRow) -> Self {
        LedgerLine {
            id: row.id,
            customer_id: row.customer_id,
            customer_name: row.customer_name,
            entry_type: EntryType::from_str(&row.entry_type).unwrap_or_else(|| {
                warn!("Unknown ledger entry type in database: {}", row.entry_type);
                EntryType::Adjust
            }),
            stamps: row.stamps,
            note: row.note,
            created_by_name: row.created_by_name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MemberRow {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub balance: i64,
    pub last_activity_at: DateTime<Utc>,
}

const PROGRAM_COLUMNS: &str =
    "id, tenant_id, name, stamps_required, reward_description, is_active, valid_until, created_at, modified_at";

#[async_trait]
impl LoyaltyRepository for PgLoyaltyRepository {
    async fn list_programs(&self, tenant_id: &Uuid) -> Result<Vec<LoyaltyProgram>, DomainError> {
        let rows: Vec<ProgramRow> = sqlx::query_as(&format!(
            "SELECT {PROGRAM_COLUMNS} FROM loyalty_programs WHERE tenant_id = $1 ORDER BY is_active DESC, name"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing loyalty programs", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_program(&self, tenant_id: &Uuid, id: &Uuid) -> Result<Option<LoyaltyProgram>, DomainError> {
        let row: Option<ProgramRow> = sqlx::query_as(&format!(
            "SELECT {PROGRAM_COLUMNS} FROM loyalty_programs WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("finding loyalty program", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn create_program(&self, program: &LoyaltyProgram) -> Result<LoyaltyProgram, DomainError> {
        let row: ProgramRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO loyalty_programs (
                id, tenant_id, name, stamps_required, reward_description, is_active, valid_until, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROGRAM_COLUMNS}
            "#
        ))
        .bind(program.id)
        .bind(program.tenant_id)
        .bind(&program.name)
        .bind(program.stamps_required)
        .bind(&program.reward_description)
        .bind(program.is_active)
        .bind(program.valid_until)
        .bind(program.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("creating loyalty program", e))?;

        Ok(row.into())
    }

    async fn update_program(&self, program: &LoyaltyProgram) -> Result<LoyaltyProgram, DomainError> {
        let row: Option<ProgramRow> = sqlx::query_as(&format!(
            r#"
            UPDATE loyalty_programs
            SET name = $3, stamps_required = $4, reward_description = $5,
                is_active = $6, valid_until = $7, modified_at = $8
            WHERE id = $1 AND tenant_id = $2
            RETURNING {PROGRAM_COLUMNS}
            "#
        ))
        .bind(program.id)
        .bind(program.tenant_id)
        .bind(&program.name)
        .bind(program.stamps_required)
        .bind(&program.reward_description)
        .bind(program.is_active)
        .bind(program.valid_until)
        .bind(program.modified_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("updating loyalty program", e))?;

        row.map(Into::into).ok_or(DomainError::ProgramNotFound)
    }

    async fn balance(&self, program_id: &Uuid, customer_id: &Uuid) -> Result<i64, DomainError> {
        let (balance,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(stamps), 0)::BIGINT
            FROM loyalty_ledgers
            WHERE program_id = $1 AND customer_id = $2
            "#,
        )
        .bind(program_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("reading stamp balance", e))?;

        Ok(balance)
    }

    async fn append_entry(&self, entry: &LoyaltyEntry) -> Result<i64, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error("starting transaction", e))?;

        // One card at a time; released on commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text), hashtext($2::text))")
            .bind(entry.program_id)
            .bind(entry.customer_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("locking stamp card", e))?;

        let (balance,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(stamps), 0)::BIGINT
            FROM loyalty_ledgers
            WHERE program_id = $1 AND customer_id = $2
            "#,
        )
        .bind(entry.program_id)
        .bind(entry.customer_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("reading stamp balance", e))?;

        let new_balance = balance + i64::from(entry.stamps);
        if new_balance < 0 {
            return Err(DomainError::InsufficientStamps {
                balance,
                needed: -i64::from(entry.stamps),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO loyalty_ledgers (
                id, tenant_id, program_id, customer_id, entry_type, stamps, note, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id)
        .bind(entry.tenant_id)
        .bind(entry.program_id)
        .bind(entry.customer_id)
        .bind(entry.entry_type.as_str())
        .bind(entry.stamps)
        .bind(&entry.note)
        .bind(entry.created_by)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("appending ledger entry", e))?;

        tx.commit().await.map_err(|e| db_error("committing ledger entry", e))?;

        debug!(
            "Ledger {} {} for customer {}: balance {} -> {}",
            entry.entry_type.as_str(),
            entry.stamps,
            entry.customer_id,
            balance,
            new_balance
        );
        Ok(new_balance)
    }

    async fn ledger(&self, program_id: &Uuid, page: Pagination) -> Result<PageResult<LedgerLine>, DomainError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM loyalty_ledgers WHERE program_id = $1")
            .bind(program_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("counting ledger entries", e))?;

        let rows: Vec<LedgerLineRow> = sqlx::query_as(
            r#"
            SELECT
                l.id, l.customer_id, c.name AS customer_name,
                l.entry_type, l.stamps, l.note,
                COALESCE(u.display_name, '') AS created_by_name,
                l.created_at
            FROM loyalty_ledgers l
            JOIN customers c ON c.id = l.customer_id
            LEFT JOIN users u ON u.id = l.created_by
            WHERE l.program_id = $1
            ORDER BY l.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(program_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing ledger entries", e))?;

        Ok(PageResult::new(rows.into_iter().map(Into::into).collect(), total, page))
    }

    async fn members(&self, program_id: &Uuid) -> Result<Vec<MemberBalance>, DomainError> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            r#"
            SELECT
                l.customer_id,
                c.name AS customer_name,
                SUM(l.stamps)::BIGINT AS balance,
                MAX(l.created_at) AS last_activity_at
            FROM loyalty_ledgers l
            JOIN customers c ON c.id = l.customer_id
            WHERE l.program_id = $1
            GROUP BY l.customer_id, c.name
            ORDER BY last_activity_at DESC
            "#,
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing program members", e))?;

        Ok(rows
            .into_iter()
            .map(|r| MemberBalance {
                customer_id: r.customer_id,
                customer_name: r.customer_name,
                balance: r.balance,
                last_activity_at: r.last_activity_at,
            })
            .collect())
    }
}
