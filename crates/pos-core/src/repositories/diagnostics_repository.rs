//! Diagnostics repository trait (port)

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait DiagnosticsRepository: Send + Sync {
    async fn ping(&self) -> Result<(), DomainError>;
    /// Columns of the given tables in the current schema.
    async fn columns(&self, tables: &[String]) -> Result<Vec<ColumnInfo>, DomainError>;
}
