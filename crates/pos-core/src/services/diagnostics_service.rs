//! Read-only checks behind the diagnostics pages

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::DomainError;
use crate::repositories::{BranchRepository, DiagnosticsRepository, TenantRepository};

/// Columns the back-office reads, per table.
pub const EXPECTED_SCHEMA: &[(&str, &[&str])] = &[
    ("subscription_plans", &["id", "code", "name", "max_branches", "max_users", "monthly_price_cents", "is_active"]),
    ("tenants", &["id", "name", "slug", "plan_id", "is_active", "subscription_expires_at", "removed_at"]),
    ("branches", &["id", "tenant_id", "code", "name", "address", "is_active"]),
    ("users", &["id", "tenant_id", "branch_id", "email", "display_name", "password_hash", "role", "is_active", "last_login_at"]),
    ("super_admins", &["id", "email", "display_name", "password_hash", "is_active"]),
    ("products", &["id", "tenant_id", "sku", "name", "price_cents", "is_active"]),
    ("product_stocks", &["product_id", "branch_id", "quantity"]),
    ("stockflow_transfers", &["id", "tenant_id", "reference", "from_branch_id", "to_branch_id", "status", "created_by"]),
    ("stockflow_transfer_items", &["id", "transfer_id", "product_id", "quantity_requested", "quantity_received"]),
    ("customers", &["id", "tenant_id", "name", "phone", "email"]),
    ("loyalty_programs", &["id", "tenant_id", "name", "stamps_required", "reward_description", "is_active", "valid_until"]),
    ("loyalty_ledgers", &["id", "tenant_id", "program_id", "customer_id", "entry_type", "stamps", "note", "created_by"]),
];

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table: String,
    pub exists: bool,
    pub missing_columns: Vec<String>,
    pub extra_columns: Vec<String>,
}

impl TableReport {
    pub fn is_ok(&self) -> bool {
        self.exists && self.missing_columns.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    pub ok: bool,
    pub tables: Vec<TableReport>,
}

/// Answer to "can this device be set up for this tenant/branch?".
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSetupCheck {
    pub success: bool,
    pub device_name: String,
    pub tenant_name: Option<String>,
    pub branch_name: Option<String>,
    pub problems: Vec<String>,
}

pub struct DiagnosticsService {
    diagnostics: Arc<dyn DiagnosticsRepository>,
    tenants: Arc<dyn TenantRepository>,
    branches: Arc<dyn BranchRepository>,
}

impl DiagnosticsService {
    pub fn new(
        diagnostics: Arc<dyn DiagnosticsRepository>,
        tenants: Arc<dyn TenantRepository>,
        branches: Arc<dyn BranchRepository>,
    ) -> Self {
        Self {
            diagnostics,
            tenants,
            branches,
        }
    }

    /// Round-trip time of a trivial query, in milliseconds.
    pub async fn ping_database(&self) -> Result<u128, DomainError> {
        let started = Instant::now();
        self.diagnostics.ping().await?;
        Ok(started.elapsed().as_millis())
    }

    pub async fn check_schema(&self) -> Result<SchemaReport, DomainError> {
        let tables: Vec<String> = EXPECTED_SCHEMA.iter().map(|(t, _)| t.to_string()).collect();
        let columns = self.diagnostics.columns(&tables).await?;

        let reports: Vec<TableReport> = EXPECTED_SCHEMA
            .iter()
            .map(|(table, expected)| {
                let actual: HashSet<&str> = columns
                    .iter()
                    .filter(|c| c.table_name == *table)
                    .map(|c| c.column_name.as_str())
                    .collect();
                let expected_set: HashSet<&str> = expected.iter().copied().collect();

                let missing_columns = expected
                    .iter()
                    .filter(|c| !actual.contains(*c))
                    .map(|c| c.to_string())
                    .collect();
                let mut extra_columns: Vec<String> = actual
                    .iter()
                    .filter(|c| !expected_set.contains(*c))
                    .map(|c| c.to_string())
                    .collect();
                extra_columns.sort();

                TableReport {
                    table: table.to_string(),
                    exists: !actual.is_empty(),
                    missing_columns,
                    extra_columns,
                }
            })
            .collect();

        let ok = reports.iter().all(TableReport::is_ok);
        if ok {
            info!("Schema check passed for {} tables", reports.len());
        } else {
            warn!("Schema check found problems");
        }
        Ok(SchemaReport { ok, tables: reports })
    }

    /// Problems are collected rather than returned as errors so the caller
    /// gets the whole picture in one response.
    pub async fn device_setup_check(
        &self,
        tenant_slug: &str,
        branch_code: &str,
        device_name: &str,
    ) -> Result<DeviceSetupCheck, DomainError> {
        let mut check = DeviceSetupCheck {
            success: false,
            device_name: device_name.trim().to_string(),
            tenant_name: None,
            branch_name: None,
            problems: Vec::new(),
        };

        if check.device_name.is_empty() {
            check.problems.push("device name is required".to_string());
        }

        let tenant = self.tenants.find_by_slug(tenant_slug.trim()).await?;
        let Some(tenant) = tenant.filter(|t| !t.is_deleted()) else {
            check.problems.push(format!("tenant '{}' not found", tenant_slug.trim()));
            return Ok(check);
        };
        check.tenant_name = Some(tenant.name.clone());
        if !tenant.is_active {
            check.problems.push("tenant is inactive".to_string());
        }
        if !tenant.is_subscription_active() {
            check.problems.push("tenant subscription expired".to_string());
        }

        let code = branch_code.trim().to_uppercase();
        match self.branches.find_by_code(&tenant.id, &code).await? {
            Some(branch) => {
                check.branch_name = Some(branch.name.clone());
                if !branch.is_active {
                    check.problems.push("branch is inactive".to_string());
                }
            }
            None => check
                .problems
                .push(format!("branch '{}' does not belong to tenant '{}'", code, tenant.slug)),
        }

        check.success = check.problems.is_empty();
        info!(
            "Device setup check for '{}' at {}/{}: {}",
            check.device_name,
            tenant.slug,
            code,
            if check.success { "ok" } else { "failed" }
        );
        Ok(check)
    }
}
