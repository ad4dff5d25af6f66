//! PostgreSQL diagnostics probes

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use pos_core::error::DomainError;
use pos_core::repositories::{ColumnInfo, DiagnosticsRepository};

use super::db_error;

pub struct PgDiagnosticsRepository {
    pool: PgPool,
}

impl PgDiagnosticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ColumnRow {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

#[async_trait]
impl DiagnosticsRepository for PgDiagnosticsRepository {
    async fn ping(&self) -> Result<(), DomainError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("pinging database", e))?;
        Ok(())
    }

    async fn columns(&self, tables: &[String]) -> Result<Vec<ColumnInfo>, DomainError> {
        let rows: Vec<ColumnRow> = sqlx::query_as(
            r#"
            SELECT table_name::text, column_name::text, data_type::text
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = ANY($1)
            ORDER BY table_name, ordinal_position
            "#,
        )
        .bind(tables)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("reading schema columns", e))?;

        Ok(rows
            .into_iter()
            .map(|r| ColumnInfo {
                table_name: r.table_name,
                column_name: r.column_name,
                data_type: r.data_type,
            })
            .collect())
    }
}
