// ============================================================================
// POS Core - Stock Transfer Entity
// File: crates/pos-core/src/domain/stock_transfer.rs
// Description: Inter-branch stock transfer and its status machine
// ============================================================================
//! Stockflow transfers.
//!
//! ```text
//!   pending ──ship──▶ shipped ──receive──▶ received
//!      │                 │
//!      └────cancel───────┴──cancel──▶ cancelled
//! ```
//!
//! Every transition returns the stock movements it implies. The repository
//! persists the status change and the movements in one transaction, guarded on
//! the status the transition started from.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pos_shared::constants::TRANSFER_REFERENCE_PREFIX;

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Shipped,
    Received,
    Cancelled,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 4] = [
        TransferStatus::Pending,
        TransferStatus::Shipped,
        TransferStatus::Received,
        TransferStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Shipped => "shipped",
            TransferStatus::Received => "received",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransferStatus::Pending),
            "shipped" => Some(TransferStatus::Shipped),
            "received" => Some(TransferStatus::Received),
            "cancelled" => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Received | TransferStatus::Cancelled)
    }

    /// Status reached by applying `action`, or `None` when not allowed.
    pub fn next(&self, action: TransferAction) -> Option<TransferStatus> {
        match (self, action) {
            (TransferStatus::Pending, TransferAction::Ship) => Some(TransferStatus::Shipped),
            (TransferStatus::Shipped, TransferAction::Receive) => Some(TransferStatus::Received),
            (TransferStatus::Pending | TransferStatus::Shipped, TransferAction::Cancel) => {
                Some(TransferStatus::Cancelled)
            }
            _ => None,
        }
    }

    pub fn can(&self, action: TransferAction) -> bool {
        self.next(action).is_some()
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferAction {
    Ship,
    Receive,
    Cancel,
}

impl TransferAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferAction::Ship => "ship",
            TransferAction::Receive => "receive",
            TransferAction::Cancel => "cancel",
        }
    }
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed change to the on-hand quantity of a product at a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEffect {
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub delta: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferItem {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    pub quantity_requested: i32,
    /// Set when the transfer is received. May be lower than requested.
    pub quantity_received: Option<i32>,
}

impl TransferItem {
    pub fn shortfall(&self) -> i32 {
        self.quantity_received
            .map(|received| self.quantity_requested - received)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockTransfer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub reference: String,
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub status: TransferStatus,
    pub notes: Option<String>,
    pub items: Vec<TransferItem>,

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

impl StockTransfer {
    /// `lines` are `(product_id, quantity)`. Branch and product tenancy is
    /// checked by the service, which has the repositories to look them up.
    pub fn new(
        tenant_id: Uuid,
        from_branch_id: Uuid,
        to_branch_id: Uuid,
        lines: &[(Uuid, i32)],
        notes: Option<String>,
        created_by: Uuid,
    ) -> Result<Self, DomainError> {
        if from_branch_id == to_branch_id {
            return Err(DomainError::ValidationError(
                "Source and destination branch must differ".to_string(),
            ));
        }
        if lines.is_empty() {
            return Err(DomainError::ValidationError(
                "A transfer needs at least one item".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(lines.len());

        for &(product_id, quantity) in lines {
            if quantity <= 0 {
                return Err(DomainError::ValidationError(format!(
                    "Quantity for product {} must be positive",
                    product_id
                )));
            }
            if !seen.insert(product_id) {
                return Err(DomainError::ValidationError(format!(
                    "Product {} appears more than once",
                    product_id
                )));
            }
            items.push(TransferItem {
                id: Uuid::new_v4(),
                transfer_id: id,
                product_id,
                quantity_requested: quantity,
                quantity_received: None,
            });
        }

        let now = Utc::now();
        Ok(Self {
            id,
            tenant_id,
            reference: Self::generate_reference(now),
            from_branch_id,
            to_branch_id,
            status: TransferStatus::Pending,
            notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            items,
            created_at: now,
            created_by,
            shipped_at: None,
            shipped_by: None,
            received_at: None,
            received_by: None,
            cancelled_at: None,
            cancelled_by: None,
            cancel_reason: None,
        })
    }

    /// `TRF-YYYYMMDD-XXXXXX`
    pub fn generate_reference(at: DateTime<Utc>) -> String {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|b| (b as char).to_ascii_uppercase())
            .collect();
        format!("{}-{}-{}", TRANSFER_REFERENCE_PREFIX, at.format("%Y%m%d"), suffix)
    }

    pub fn involves_branch(&self, branch_id: Uuid) -> bool {
        self.from_branch_id == branch_id || self.to_branch_id == branch_id
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity_requested as i64).sum()
    }

    fn transition(&mut self, action: TransferAction) -> Result<TransferStatus, DomainError> {
        let next = self.status.next(action).ok_or(DomainError::InvalidTransition {
            from: self.status,
            action,
        })?;
        self.status = next;
        Ok(next)
    }

    /// Pending → shipped. Stock leaves the source branch.
    pub fn ship(&mut self, by: Uuid) -> Result<Vec<StockEffect>, DomainError> {
        self.transition(TransferAction::Ship)?;
        self.shipped_at = Some(Utc::now());
        self.shipped_by = Some(by);

        Ok(self
            .items
            .iter()
            .map(|item| StockEffect {
                product_id: item.product_id,
                branch_id: self.from_branch_id,
                delta: -item.quantity_requested,
            })
            .collect())
    }

    /// Shipped → received. `received` overrides the quantity for listed
    /// products; unlisted items are received in full. A shortfall stays on the
    /// item as a discrepancy and is not returned to the source.
    pub fn receive(&mut self, by: Uuid, received: &[(Uuid, i32)]) -> Result<Vec<StockEffect>, DomainError> {
        if !self.status.can(TransferAction::Receive) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                action: TransferAction::Receive,
            });
        }

        for &(product_id, quantity) in received {
            let item = self
                .items
                .iter()
                .find(|i| i.product_id == product_id)
                .ok_or(DomainError::ProductNotFound(product_id))?;
            if quantity < 0 || quantity > item.quantity_requested {
                return Err(DomainError::ValidationError(format!(
                    "Received quantity for product {} must be between 0 and {}",
                    product_id, item.quantity_requested
                )));
            }
        }

        self.transition(TransferAction::Receive)?;
        self.received_at = Some(Utc::now());
        self.received_by = Some(by);

        let to_branch = self.to_branch_id;
        let mut effects = Vec::with_capacity(self.items.len());
        for item in &mut self.items {
            let quantity = received
                .iter()
                .find(|(product_id, _)| *product_id == item.product_id)
                .map(|&(_, q)| q)
                .unwrap_or(item.quantity_requested);
            item.quantity_received = Some(quantity);

            if quantity > 0 {
                effects.push(StockEffect {
                    product_id: item.product_id,
                    branch_id: to_branch,
                    delta: quantity,
                });
            }
        }

        Ok(effects)
    }

    /// Pending or shipped → cancelled. A shipped transfer returns its stock
    /// to the source branch.
    pub fn cancel(&mut self, by: Uuid, reason: Option<String>) -> Result<Vec<StockEffect>, DomainError> {
        let was_shipped = self.status == TransferStatus::Shipped;
        self.transition(TransferAction::Cancel)?;
        self.cancelled_at = Some(Utc::now());
        self.cancelled_by = Some(by);
        self.cancel_reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());

        if !was_shipped {
            return Ok(Vec::new());
        }

        Ok(self
            .items
            .iter()
            .map(|item| StockEffect {
                product_id: item.product_id,
                branch_id: self.from_branch_id,
                delta: item.quantity_requested,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        transfer: StockTransfer,
        from: Uuid,
        to: Uuid,
        beans: Uuid,
        milk: Uuid,
    }

    fn fixture() -> Fixture {
        let (from, to, beans, milk) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let transfer = StockTransfer::new(
            Uuid::new_v4(),
            from,
            to,
            &[(beans, 10), (milk, 4)],
            Some("  weekly restock ".into()),
            Uuid::new_v4(),
        )
        .unwrap();
        Fixture { transfer, from, to, beans, milk }
    }

    #[test]
    fn test_new_transfer_is_pending() {
        let f = fixture();
        assert_eq!(f.transfer.status, TransferStatus::Pending);
        assert_eq!(f.transfer.notes.as_deref(), Some("weekly restock"));
        assert_eq!(f.transfer.total_quantity(), 14);
        assert!(f.transfer.reference.starts_with("TRF-"));
        assert_eq!(f.transfer.reference.len(), "TRF-20260101-ABCDEF".len());
        assert!(f.transfer.items.iter().all(|i| i.transfer_id == f.transfer.id));
    }

    #[test]
    fn test_new_rejects_invalid_lines() {
        let (a, b, p) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let t = Uuid::new_v4();
        assert!(StockTransfer::new(t, a, a, &[(p, 1)], None, t).is_err());
        assert!(StockTransfer::new(t, a, b, &[], None, t).is_err());
        assert!(StockTransfer::new(t, a, b, &[(p, 0)], None, t).is_err());
        assert!(StockTransfer::new(t, a, b, &[(p, 1), (p, 2)], None, t).is_err());
    }

    #[test]
    fn test_status_table() {
        use TransferAction::*;
        use TransferStatus::*;

        assert_eq!(Pending.next(Ship), Some(Shipped));
        assert_eq!(Pending.next(Cancel), Some(Cancelled));
        assert_eq!(Pending.next(Receive), None);
        assert_eq!(Shipped.next(Receive), Some(Received));
        assert_eq!(Shipped.next(Cancel), Some(Cancelled));
        assert_eq!(Shipped.next(Ship), None);
        for action in [Ship, Receive, Cancel] {
            assert_eq!(Received.next(action), None);
            assert_eq!(Cancelled.next(action), None);
        }
        assert!(Received.is_terminal());
        assert!(!Shipped.is_terminal());
    }

    #[test]
    fn test_ship_deducts_from_source() {
        let mut f = fixture();
        let by = Uuid::new_v4();
        let effects = f.transfer.ship(by).unwrap();

        assert_eq!(f.transfer.status, TransferStatus::Shipped);
        assert_eq!(f.transfer.shipped_by, Some(by));
        assert_eq!(effects.len(), 2);
        assert!(effects.iter().all(|e| e.branch_id == f.from && e.delta < 0));
        assert!(effects.contains(&StockEffect { product_id: f.beans, branch_id: f.from, delta: -10 }));
    }

    #[test]
    fn test_ship_twice_is_rejected() {
        let mut f = fixture();
        f.transfer.ship(Uuid::new_v4()).unwrap();
        let err = f.transfer.ship(Uuid::new_v4()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition { from: TransferStatus::Shipped, action: TransferAction::Ship }
        ));
    }

    #[test]
    fn test_receive_partial() {
        let mut f = fixture();
        f.transfer.ship(Uuid::new_v4()).unwrap();
        let effects = f.transfer.receive(Uuid::new_v4(), &[(f.milk, 3)]).unwrap();

        assert_eq!(f.transfer.status, TransferStatus::Received);
        assert!(effects.contains(&StockEffect { product_id: f.beans, branch_id: f.to, delta: 10 }));
        assert!(effects.contains(&StockEffect { product_id: f.milk, branch_id: f.to, delta: 3 }));

        let milk = f.transfer.items.iter().find(|i| i.product_id == f.milk).unwrap();
        assert_eq!(milk.quantity_received, Some(3));
        assert_eq!(milk.shortfall(), 1);
    }

    #[test]
    fn test_receive_zero_has_no_effect_for_item() {
        let mut f = fixture();
        f.transfer.ship(Uuid::new_v4()).unwrap();
        let effects = f.transfer.receive(Uuid::new_v4(), &[(f.beans, 0)]).unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].product_id, f.milk);
    }

    #[test]
    fn test_receive_rejects_bad_quantities_without_changing_state() {
        let mut f = fixture();
        f.transfer.ship(Uuid::new_v4()).unwrap();

        assert!(f.transfer.receive(Uuid::new_v4(), &[(f.beans, 11)]).is_err());
        assert!(f.transfer.receive(Uuid::new_v4(), &[(f.beans, -1)]).is_err());
        assert!(matches!(
            f.transfer.receive(Uuid::new_v4(), &[(Uuid::new_v4(), 1)]),
            Err(DomainError::ProductNotFound(_))
        ));
        assert_eq!(f.transfer.status, TransferStatus::Shipped);
        assert!(f.transfer.items.iter().all(|i| i.quantity_received.is_none()));
    }

    #[test]
    fn test_receive_pending_is_rejected() {
        let mut f = fixture();
        assert!(matches!(
            f.transfer.receive(Uuid::new_v4(), &[]),
            Err(DomainError::InvalidTransition { from: TransferStatus::Pending, .. })
        ));
    }

    #[test]
    fn test_cancel_pending_has_no_stock_effect() {
        let mut f = fixture();
        let effects = f.transfer.cancel(Uuid::new_v4(), Some("wrong branch".into())).unwrap();
        assert!(effects.is_empty());
        assert_eq!(f.transfer.status, TransferStatus::Cancelled);
        assert_eq!(f.transfer.cancel_reason.as_deref(), Some("wrong branch"));
    }

    #[test]
    fn test_cancel_shipped_returns_stock() {
        let mut f = fixture();
        f.transfer.ship(Uuid::new_v4()).unwrap();
        let effects = f.transfer.cancel(Uuid::new_v4(), None).unwrap();
        assert_eq!(effects.len(), 2);
        assert!(effects.iter().all(|e| e.branch_id == f.from && e.delta > 0));
        let returned: i32 = effects.iter().map(|e| e.delta).sum();
        assert_eq!(returned, 14);
    }

    #[test]
    fn test_cancel_received_is_rejected() {
        let mut f = fixture();
        f.transfer.ship(Uuid::new_v4()).unwrap();
        f.transfer.receive(Uuid::new_v4(), &[]).unwrap();
        assert!(f.transfer.cancel(Uuid::new_v4(), None).is_err());
        assert_eq!(f.transfer.status, TransferStatus::Received);
    }
}
