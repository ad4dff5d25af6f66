//! PostgreSQL customer repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use pos_core::domain::Customer;
use pos_core::error::DomainError;
use pos_core::repositories::CustomerRepository;
use pos_shared::{PageResult, Pagination};

use super::db_error;

pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CustomerRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

const CUSTOMER_COLUMNS: &str = "id, tenant_id, name, phone, email, created_at";

/// `$1` tenant, `$2` search over name, phone and email.
const CUSTOMER_FILTER: &str = r#"
    tenant_id = $1
    AND ($2::text IS NULL
         OR name ILIKE '%' || $2 || '%'
         OR phone ILIKE '%' || $2 || '%'
         OR email ILIKE '%' || $2 || '%')
"#;

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn list(
        &self,
        tenant_id: &Uuid,
        search: Option<String>,
        page: Pagination,
    ) -> Result<PageResult<Customer>, DomainError> {
        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM customers WHERE {CUSTOMER_FILTER}"))
            .bind(tenant_id)
            .bind(&search)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("counting customers", e))?;

        let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE {CUSTOMER_FILTER} ORDER BY name LIMIT $3 OFFSET $4"
        ))
        .bind(tenant_id)
        .bind(&search)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing customers", e))?;

        Ok(PageResult::new(rows.into_iter().map(Into::into).collect(), total, page))
    }

    async fn find_by_id(&self, tenant_id: &Uuid, id: &Uuid) -> Result<Option<Customer>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("finding customer", e))?;

        Ok(row.map(|r| r.into()))
    }

    async fn create(&self, customer: &Customer) -> Result<Customer, DomainError> {
        let row: CustomerRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO customers (id, tenant_id, name, phone, email, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CUSTOMER_COLUMNS}
            "#
        ))
        .bind(customer.id)
        .bind(customer.tenant_id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("creating customer", e))?;

        Ok(row.into())
    }
}
