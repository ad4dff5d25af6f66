// ============================================================================
// POS Infrastructure - PostgreSQL Stockflow Repository
// File: crates/pos-infrastructure/src/database/postgres/transfer_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{error, info};
use uuid::Uuid;

use pos_core::domain::{StockEffect, StockTransfer, TransferAction, TransferItem, TransferStatus};
use pos_core::error::DomainError;
use pos_core::repositories::{TransferFilter, TransferRepository, TransferSummary};
use pos_shared::{PageResult, Pagination};

use super::db_error;

pub struct PgTransferRepository {
    pool: PgPool,
}

impl PgTransferRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TransferRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub reference: String,
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    pub shipped_at: Option<DateTime<Utc>>,
    pub shipped_by: Option<Uuid>,
    pub received_at: Option<DateTime<Utc>>,
    pub received_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancel_reason: Option<String>,
}

impl TransferRow {
    fn into_transfer(self, items: Vec<TransferItem>) -> Result<StockTransfer, DomainError> {
        Ok(StockTransfer {
            id: self.id,
            tenant_id: self.tenant_id,
            reference: self.reference,
            from_branch_id: self.from_branch_id,
            to_branch_id: self.to_branch_id,
            status: parse_status(&self.status)?,
            notes: self.notes,
            items,
            created_at: self.created_at,
            created_by: self.created_by,
            shipped_at: self.shipped_at,
            shipped_by: self.shipped_by,
            received_at: self.received_at,
            received_by: self.received_by,
            cancelled_at: self.cancelled_at,
            cancelled_by: self.cancelled_by,
            cancel_reason: self.cancel_reason,
        })
    }
}

#[derive(Debug, FromRow)]
struct TransferItemRow {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    pub quantity_requested: i32,
    pub quantity_received: Option<i32>,
}

impl From<TransferItemRow> for TransferItem {
    fn from(row: TransferItemRow) -> Self {
        TransferItem {
            id: row.id,
            transfer_id: row.transfer_id,
            product_id: row.product_id,
            quantity_requested: row.quantity_requested,
            quantity_received: row.quantity_received,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransferSummaryRow {
    pub id: Uuid,
    pub reference: String,
    pub status: String,
    pub from_branch_id: Uuid,
    pub from_branch_name: String,
    pub to_branch_id: Uuid,
    pub to_branch_name: String,
    pub item_count: i64,
    pub total_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub created_by_name: String,
}

impl TryFrom<TransferSummaryRow> for TransferSummary {
    type Error = DomainError;

    fn try_from(row: TransferSummaryRow) -> Result<Self, Self::Error> {
        Ok(TransferSummary {
            id: row.id,
            reference: row.reference,
            status: parse_status(&row.status)?,
            from_branch_id: row.from_branch_id,
            from_branch_name: row.from_branch_name,
            to_branch_id: row.to_branch_id,
            to_branch_name: row.to_branch_name,
            item_count: row.item_count,
            total_quantity: row.total_quantity,
            created_at: row.created_at,
            created_by_name: row.created_by_name,
        })
    }
}

fn parse_status(s: &str) -> Result<TransferStatus, DomainError> {
    TransferStatus::from_str(s).ok_or_else(|| {
        error!("Unknown transfer status in database: {}", s);
        DomainError::InternalError(format!("unknown transfer status '{}'", s))
    })
}

/// The action that leads into `status`.
fn action_into(status: TransferStatus) -> TransferAction {
    match status {
        TransferStatus::Received => TransferAction::Receive,
        TransferStatus::Cancelled => TransferAction::Cancel,
        _ => TransferAction::Ship,
    }
}

const TRANSFER_COLUMNS: &str = r#"
    t.id, t.tenant_id, t.reference, t.from_branch_id, t.to_branch_id, t.status, t.notes,
    t.created_at, t.created_by, t.shipped_at, t.shipped_by, t.received_at, t.received_by,
    t.cancelled_at, t.cancelled_by, t.cancel_reason
"#;

/// `$1` tenant, `$2` status, `$3` branch on either side.
const TRANSFER_FILTER: &str = r#"
    t.tenant_id = $1
    AND ($2::text IS NULL OR t.status = $2)
    AND ($3::uuid IS NULL OR t.from_branch_id = $3 OR t.to_branch_id = $3)
"#;

impl PgTransferRepository {
    async fn load_items(&self, transfer_id: &Uuid) -> Result<Vec<TransferItem>, DomainError> {
        let rows: Vec<TransferItemRow> = sqlx::query_as(
            r#"
            SELECT i.id, i.transfer_id, i.product_id, i.quantity_requested, i.quantity_received
            FROM stockflow_transfer_items i
            JOIN products p ON p.id = i.product_id
            WHERE i.transfer_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("loading transfer items", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn apply_effect(tx: &mut Transaction<'_, Postgres>, effect: &StockEffect) -> Result<(), DomainError> {
        if effect.delta < 0 {
            let result = sqlx::query(
                r#"
                UPDATE product_stocks
                SET quantity = quantity + $3
                WHERE product_id = $1 AND branch_id = $2 AND quantity + $3 >= 0
                "#,
            )
            .bind(effect.product_id)
            .bind(effect.branch_id)
            .bind(effect.delta)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("debiting stock", e))?;

            if result.rows_affected() == 0 {
                return Err(DomainError::InsufficientStock {
                    product_id: effect.product_id,
                    branch_id: effect.branch_id,
                });
            }
        } else {
            sqlx::query(
                r#"
                INSERT INTO product_stocks (product_id, branch_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (product_id, branch_id)
                DO UPDATE SET quantity = product_stocks.quantity + EXCLUDED.quantity
                "#,
            )
            .bind(effect.product_id)
            .bind(effect.branch_id)
            .bind(effect.delta)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("crediting stock", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl TransferRepository for PgTransferRepository {
    async fn list(
        &self,
        tenant_id: &Uuid,
        filter: &TransferFilter,
        page: Pagination,
    ) -> Result<PageResult<TransferSummary>, DomainError> {
        let status = filter.status.map(|s| s.as_str());

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM stockflow_transfers t WHERE {TRANSFER_FILTER}"))
                .bind(tenant_id)
                .bind(status)
                .bind(filter.branch_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("counting transfers", e))?;

        let rows: Vec<TransferSummaryRow> = sqlx::query_as(&format!(
            r#"
            SELECT
                t.id, t.reference, t.status,
                t.from_branch_id, fb.name AS from_branch_name,
                t.to_branch_id, tb.name AS to_branch_name,
                (SELECT COUNT(*) FROM stockflow_transfer_items i WHERE i.transfer_id = t.id) AS item_count,
                (SELECT COALESCE(SUM(i.quantity_requested), 0)::BIGINT
                   FROM stockflow_transfer_items i WHERE i.transfer_id = t.id) AS total_quantity,
                t.created_at,
                COALESCE(u.display_name, '') AS created_by_name
            FROM stockflow_transfers t
            JOIN branches fb ON fb.id = t.from_branch_id
            JOIN branches tb ON tb.id = t.to_branch_id
            LEFT JOIN users u ON u.id = t.created_by
            WHERE {TRANSFER_FILTER}
            ORDER BY t.created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(tenant_id)
        .bind(status)
        .bind(filter.branch_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing transfers", e))?;

        let items = rows
            .into_iter()
            .map(TransferSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageResult::new(items, total, page))
    }

    async fn find_by_id(&self, tenant_id: &Uuid, id: &Uuid) -> Result<Option<StockTransfer>, DomainError> {
        let row: Option<TransferRow> = sqlx::query_as(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM stockflow_transfers t WHERE t.id = $1 AND t.tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("finding transfer", e))?;

        match row {
            Some(row) => {
                let items = self.load_items(&row.id).await?;
                row.into_transfer(items).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn create(&self, transfer: &StockTransfer) -> Result<StockTransfer, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error("starting transaction", e))?;

        let row: TransferRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO stockflow_transfers AS t (
                id, tenant_id, reference, from_branch_id, to_branch_id, status, notes,
                created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {TRANSFER_COLUMNS}
            "#
        ))
        .bind(transfer.id)
        .bind(transfer.tenant_id)
        .bind(&transfer.reference)
        .bind(transfer.from_branch_id)
        .bind(transfer.to_branch_id)
        .bind(transfer.status.as_str())
        .bind(&transfer.notes)
        .bind(transfer.created_at)
        .bind(transfer.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("creating transfer", e))?;

        for item in &transfer.items {
            sqlx::query(
                r#"
                INSERT INTO stockflow_transfer_items (id, transfer_id, product_id, quantity_requested)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(item.id)
            .bind(transfer.id)
            .bind(item.product_id)
            .bind(item.quantity_requested)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("creating transfer item", e))?;
        }

        tx.commit().await.map_err(|e| db_error("committing transfer", e))?;

        info!("Transfer {} created with {} items", row.reference, transfer.items.len());
        row.into_transfer(transfer.items.clone())
    }

    async fn apply_transition(
        &self,
        transfer: &StockTransfer,
        from_status: TransferStatus,
        effects: &[StockEffect],
    ) -> Result<StockTransfer, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error("starting transaction", e))?;

        let row: Option<TransferRow> = sqlx::query_as(&format!(
            r#"
            UPDATE stockflow_transfers t
            SET
                status = $4,
                shipped_at = $5, shipped_by = $6,
                received_at = $7, received_by = $8,
                cancelled_at = $9, cancelled_by = $10, cancel_reason = $11
            WHERE t.id = $1 AND t.tenant_id = $2 AND t.status = $3
            RETURNING {TRANSFER_COLUMNS}
            "#
        ))
        .bind(transfer.id)
        .bind(transfer.tenant_id)
        .bind(from_status.as_str())
        .bind(transfer.status.as_str())
        .bind(transfer.shipped_at)
        .bind(transfer.shipped_by)
        .bind(transfer.received_at)
        .bind(transfer.received_by)
        .bind(transfer.cancelled_at)
        .bind(transfer.cancelled_by)
        .bind(&transfer.cancel_reason)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("updating transfer status", e))?;

        let Some(row) = row else {
            // Someone else moved it first; report the state we lost to.
            let current: Option<(String,)> =
                sqlx::query_as("SELECT status FROM stockflow_transfers WHERE id = $1 AND tenant_id = $2")
                    .bind(transfer.id)
                    .bind(transfer.tenant_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| db_error("reading transfer status", e))?;

            return match current {
                Some((status,)) => Err(DomainError::InvalidTransition {
                    from: parse_status(&status)?,
                    action: action_into(transfer.status),
                }),
                None => Err(DomainError::TransferNotFound),
            };
        };

        if transfer.status == TransferStatus::Received {
            for item in &transfer.items {
                sqlx::query("UPDATE stockflow_transfer_items SET quantity_received = $2 WHERE id = $1")
                    .bind(item.id)
                    .bind(item.quantity_received)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| db_error("recording received quantity", e))?;
            }
        }

        for effect in effects {
            Self::apply_effect(&mut tx, effect).await?;
        }

        tx.commit().await.map_err(|e| db_error("committing transition", e))?;

        info!(
            "Transfer {} moved {} -> {} ({} stock movements)",
            row.reference,
            from_status.as_str(),
            transfer.status.as_str(),
            effects.len()
        );
        row.into_transfer(transfer.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_race_reports_the_action_that_was_attempted() {
        assert_eq!(action_into(TransferStatus::Shipped), TransferAction::Ship);
        assert_eq!(action_into(TransferStatus::Received), TransferAction::Receive);
        assert_eq!(action_into(TransferStatus::Cancelled), TransferAction::Cancel);
    }

    #[test]
    fn unknown_status_is_an_internal_error() {
        assert_eq!(parse_status("shipped").unwrap(), TransferStatus::Shipped);
        assert!(matches!(parse_status("lost-in-transit"), Err(DomainError::InternalError(_))));
    }

    /// Basic-plan tenant with two branches and one product.
    struct Seed {
        tenant_id: Uuid,
        jakarta: Uuid,
        bandung: Uuid,
        product: Uuid,
    }

    async fn seed(pool: &PgPool, jakarta_stock: Option<i32>) -> Seed {
        let seed = Seed {
            tenant_id: Uuid::new_v4(),
            jakarta: Uuid::new_v4(),
            bandung: Uuid::new_v4(),
            product: Uuid::new_v4(),
        };
        sqlx::query(
            "INSERT INTO tenants (id, name, slug, plan_id) VALUES ($1, 'Toko Maju', 'toko-maju', '00000000-0000-0000-0000-000000000001')",
        )
        .bind(seed.tenant_id)
        .execute(pool)
        .await
        .unwrap();
        for (id, code) in [(seed.jakarta, "JKT"), (seed.bandung, "BDG")] {
            sqlx::query("INSERT INTO branches (id, tenant_id, code, name) VALUES ($1, $2, $3, $3)")
                .bind(id)
                .bind(seed.tenant_id)
                .bind(code)
                .execute(pool)
                .await
                .unwrap();
        }
        sqlx::query("INSERT INTO products (id, tenant_id, sku, name) VALUES ($1, $2, 'KOPI-250', 'Kopi 250g')")
            .bind(seed.product)
            .bind(seed.tenant_id)
            .execute(pool)
            .await
            .unwrap();
        if let Some(quantity) = jakarta_stock {
            sqlx::query("INSERT INTO product_stocks (product_id, branch_id, quantity) VALUES ($1, $2, $3)")
                .bind(seed.product)
                .bind(seed.jakarta)
                .bind(quantity)
                .execute(pool)
                .await
                .unwrap();
        }
        seed
    }

    async fn stock(pool: &PgPool, product: Uuid, branch: Uuid) -> Option<i32> {
        sqlx::query_as::<_, (i32,)>("SELECT quantity FROM product_stocks WHERE product_id = $1 AND branch_id = $2")
            .bind(product)
            .bind(branch)
            .fetch_optional(pool)
            .await
            .unwrap()
            .map(|(q,)| q)
    }

    async fn pending_transfer(repo: &PgTransferRepository, seed: &Seed, quantity: i32) -> StockTransfer {
        let transfer = StockTransfer::new(
            seed.tenant_id,
            seed.jakarta,
            seed.bandung,
            &[(seed.product, quantity)],
            None,
            Uuid::new_v4(),
        )
        .unwrap();
        repo.create(&transfer).await.unwrap()
    }

    async fn try_ship(repo: &PgTransferRepository, pending: &StockTransfer) -> Result<StockTransfer, DomainError> {
        let mut transfer = pending.clone();
        let effects = transfer.ship(Uuid::new_v4()).unwrap();
        repo.apply_transition(&transfer, TransferStatus::Pending, &effects).await
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn ship_with_short_stock_rolls_back(pool: PgPool) {
        let seed = seed(&pool, Some(3)).await;
        let repo = PgTransferRepository::new(pool.clone());
        let pending = pending_transfer(&repo, &seed, 10).await;

        let err = try_ship(&repo, &pending).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock { product_id, branch_id }
                if product_id == seed.product && branch_id == seed.jakarta
        ));

        assert_eq!(stock(&pool, seed.product, seed.jakarta).await, Some(3));
        let reloaded = repo.find_by_id(&seed.tenant_id, &pending.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TransferStatus::Pending);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn ship_without_stock_row_is_insufficient(pool: PgPool) {
        let seed = seed(&pool, None).await;
        let repo = PgTransferRepository::new(pool.clone());
        let pending = pending_transfer(&repo, &seed, 1).await;

        let err = try_ship(&repo, &pending).await.unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
        assert_eq!(stock(&pool, seed.product, seed.jakarta).await, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn second_ship_from_stale_status_is_rejected(pool: PgPool) {
        let seed = seed(&pool, Some(25)).await;
        let repo = PgTransferRepository::new(pool.clone());
        let pending = pending_transfer(&repo, &seed, 10).await;

        let shipped = try_ship(&repo, &pending).await.unwrap();
        assert_eq!(shipped.status, TransferStatus::Shipped);

        // Same pending snapshot, as a concurrent request would hold it.
        let err = try_ship(&repo, &pending).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition { from: TransferStatus::Shipped, action: TransferAction::Ship }
        ));
        assert_eq!(stock(&pool, seed.product, seed.jakarta).await, Some(15));
    }
}
