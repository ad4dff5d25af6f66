//! PostgreSQL product and stock repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use pos_core::domain::{Product, StockLevel};
use pos_core::error::DomainError;
use pos_core::repositories::ProductRepository;

use super::db_error;

pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            tenant_id: row.tenant_id,
            sku: row.sku,
            name: row.name,
            price_cents: row.price_cents,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockLevelRow {
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub branch_id: Uuid,
    pub quantity: i32,
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn list_by_tenant(&self, tenant_id: &Uuid) -> Result<Vec<Product>, DomainError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, sku, name, price_cents, is_active, created_at
            FROM products
            WHERE tenant_id = $1
            ORDER BY name
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing products", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_many(&self, tenant_id: &Uuid, ids: &[Uuid]) -> Result<Vec<Product>, DomainError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, sku, name, price_cents, is_active, created_at
            FROM products
            WHERE tenant_id = $1 AND id = ANY($2)
            "#,
        )
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("finding products", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Every active product of the tenant, with zero where the branch holds none.
    async fn stock_by_branch(&self, tenant_id: &Uuid, branch_id: &Uuid) -> Result<Vec<StockLevel>, DomainError> {
        let rows: Vec<StockLevelRow> = sqlx::query_as(
            r#"
            SELECT
                p.id AS product_id,
                p.sku,
                p.name AS product_name,
                $2::uuid AS branch_id,
                COALESCE(s.quantity, 0) AS quantity
            FROM products p
            LEFT JOIN product_stocks s ON s.product_id = p.id AND s.branch_id = $2
            WHERE p.tenant_id = $1 AND p.is_active
            ORDER BY p.name
            "#,
        )
        .bind(tenant_id)
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("loading branch stock", e))?;

        Ok(rows
            .into_iter()
            .map(|r| StockLevel {
                product_id: r.product_id,
                sku: r.sku,
                product_name: r.product_name,
                branch_id: r.branch_id,
                quantity: r.quantity,
            })
            .collect())
    }
}
