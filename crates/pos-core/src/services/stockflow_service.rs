// ============================================================================
// POS Core - Stockflow Service
// File: crates/pos-core/src/services/stockflow_service.rs
// Description: Inter-branch transfers: who may do what, and tenancy checks
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use pos_shared::{PageResult, Pagination};

use crate::domain::{
    Branch, Product, StockLevel, StockTransfer, TenantActor, TransferAction, UserRole,
};
use crate::error::DomainError;
use crate::repositories::{
    BranchRepository, ProductRepository, TransferFilter, TransferRepository, TransferSummary,
};

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    /// `(product_id, quantity)`
    pub lines: Vec<(Uuid, i32)>,
    pub notes: Option<String>,
}

/// Choices offered by the "new transfer" form.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOptions {
    pub branches: Vec<Branch>,
    pub products: Vec<Product>,
}

/// One item of a transfer, joined with its product.
#[derive(Debug, Clone, Serialize)]
pub struct TransferLine {
    pub product_id: Uuid,
    pub sku: String,
    pub product_name: String,
    pub quantity_requested: i32,
    pub quantity_received: Option<i32>,
    pub shortfall: i32,
}

/// Transfer plus names and the actions the viewer may take.
#[derive(Debug, Clone, Serialize)]
pub struct TransferDetail {
    pub transfer: StockTransfer,
    pub from_branch: Branch,
    pub to_branch: Branch,
    pub lines: Vec<TransferLine>,
    pub can_ship: bool,
    pub can_receive: bool,
    pub can_cancel: bool,
}

pub struct StockflowService {
    transfers: Arc<dyn TransferRepository>,
    branches: Arc<dyn BranchRepository>,
    products: Arc<dyn ProductRepository>,
}

impl StockflowService {
    pub fn new(
        transfers: Arc<dyn TransferRepository>,
        branches: Arc<dyn BranchRepository>,
        products: Arc<dyn ProductRepository>,
    ) -> Self {
        Self {
            transfers,
            branches,
            products,
        }
    }

    /// Cashiers only ever see transfers touching their own branch.
    pub async fn list_transfers(
        &self,
        actor: &TenantActor,
        filter: TransferFilter,
        page: Pagination,
    ) -> Result<PageResult<TransferSummary>, DomainError> {
        let mut filter = filter;
        if actor.role == UserRole::Cashier {
            let own = actor
                .branch_id
                .ok_or_else(|| DomainError::Forbidden("cashier has no branch".to_string()))?;
            filter.branch_id = Some(own);
        }
        self.transfers.list(&actor.tenant_id, &filter, page).await
    }

    pub async fn get_transfer(&self, actor: &TenantActor, id: &Uuid) -> Result<StockTransfer, DomainError> {
        let transfer = self
            .transfers
            .find_by_id(&actor.tenant_id, id)
            .await?
            .ok_or(DomainError::TransferNotFound)?;

        if actor.role == UserRole::Cashier && !actor.branch_id.is_some_and(|b| transfer.involves_branch(b)) {
            return Err(DomainError::TransferNotFound);
        }
        Ok(transfer)
    }

    pub async fn transfer_detail(&self, actor: &TenantActor, id: &Uuid) -> Result<TransferDetail, DomainError> {
        let transfer = self.get_transfer(actor, id).await?;
        let from_branch = self.tenant_branch(actor, &transfer.from_branch_id).await?;
        let to_branch = self.tenant_branch(actor, &transfer.to_branch_id).await?;

        let ids: Vec<Uuid> = transfer.items.iter().map(|i| i.product_id).collect();
        let products: HashMap<Uuid, Product> = self
            .products
            .find_many(&actor.tenant_id, &ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let lines = transfer
            .items
            .iter()
            .map(|item| {
                let product = products.get(&item.product_id);
                TransferLine {
                    product_id: item.product_id,
                    sku: product.map(|p| p.sku.clone()).unwrap_or_default(),
                    product_name: product.map(|p| p.name.clone()).unwrap_or_else(|| "(removed product)".to_string()),
                    quantity_requested: item.quantity_requested,
                    quantity_received: item.quantity_received,
                    shortfall: item.shortfall(),
                }
            })
            .collect();

        let manages = actor.role.can_manage_stockflow();
        Ok(TransferDetail {
            can_ship: manages && transfer.status.can(TransferAction::Ship),
            can_receive: Self::may_receive(actor, &transfer) && transfer.status.can(TransferAction::Receive),
            can_cancel: manages && transfer.status.can(TransferAction::Cancel),
            transfer,
            from_branch,
            to_branch,
            lines,
        })
    }

    pub async fn creation_options(&self, actor: &TenantActor) -> Result<TransferOptions, DomainError> {
        Self::require_manager(actor)?;
        let branches = self
            .branches
            .list_by_tenant(&actor.tenant_id)
            .await?
            .into_iter()
            .filter(|b| b.is_active)
            .collect();
        let products = self
            .products
            .list_by_tenant(&actor.tenant_id)
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .collect();
        Ok(TransferOptions { branches, products })
    }

    pub async fn create_transfer(&self, actor: &TenantActor, input: NewTransfer) -> Result<StockTransfer, DomainError> {
        Self::require_manager(actor)?;

        let transfer = StockTransfer::new(
            actor.tenant_id,
            input.from_branch_id,
            input.to_branch_id,
            &input.lines,
            input.notes,
            actor.user_id,
        )?;

        for branch_id in [transfer.from_branch_id, transfer.to_branch_id] {
            let branch = self.tenant_branch(actor, &branch_id).await?;
            if !branch.is_active {
                return Err(DomainError::ValidationError(format!("Branch {} is inactive", branch.code)));
            }
        }

        let ids: Vec<Uuid> = transfer.items.iter().map(|i| i.product_id).collect();
        let found = self.products.find_many(&actor.tenant_id, &ids).await?;
        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|p| p.id == **id)) {
            warn!("Transfer refused: product {} not in tenant {}", missing, actor.tenant_id);
            return Err(DomainError::ProductNotFound(*missing));
        }

        let transfer = self.transfers.create(&transfer).await?;
        info!(
            "Transfer {} created: {} items, {} units",
            transfer.reference,
            transfer.items.len(),
            transfer.total_quantity()
        );
        Ok(transfer)
    }

    pub async fn ship(&self, actor: &TenantActor, id: &Uuid) -> Result<StockTransfer, DomainError> {
        Self::require_manager(actor)?;
        let mut transfer = self.get_transfer(actor, id).await?;
        let from = transfer.status;
        let effects = transfer.ship(actor.user_id)?;
        let transfer = self.transfers.apply_transition(&transfer, from, &effects).await?;
        info!("Transfer {} shipped by {}", transfer.reference, actor.user_id);
        Ok(transfer)
    }

    /// Anyone may receive at their own branch; owners and managers anywhere.
    pub async fn receive(
        &self,
        actor: &TenantActor,
        id: &Uuid,
        received: &[(Uuid, i32)],
    ) -> Result<StockTransfer, DomainError> {
        let mut transfer = self.get_transfer(actor, id).await?;
        if !Self::may_receive(actor, &transfer) {
            return Err(DomainError::Forbidden(
                "only the destination branch can receive this transfer".to_string(),
            ));
        }
        let from = transfer.status;
        let effects = transfer.receive(actor.user_id, received)?;
        let transfer = self.transfers.apply_transition(&transfer, from, &effects).await?;

        let short: i32 = transfer.items.iter().map(|i| i.shortfall()).sum();
        if short > 0 {
            warn!("Transfer {} received with a shortfall of {} units", transfer.reference, short);
        } else {
            info!("Transfer {} received in full", transfer.reference);
        }
        Ok(transfer)
    }

    pub async fn cancel(
        &self,
        actor: &TenantActor,
        id: &Uuid,
        reason: Option<String>,
    ) -> Result<StockTransfer, DomainError> {
        Self::require_manager(actor)?;
        let mut transfer = self.get_transfer(actor, id).await?;
        let from = transfer.status;
        let effects = transfer.cancel(actor.user_id, reason)?;
        let transfer = self.transfers.apply_transition(&transfer, from, &effects).await?;
        info!(
            "Transfer {} cancelled from {} ({} stock movements)",
            transfer.reference,
            from,
            effects.len()
        );
        Ok(transfer)
    }

    pub async fn branch_stock(&self, actor: &TenantActor, branch_id: &Uuid) -> Result<Vec<StockLevel>, DomainError> {
        let branch = self.tenant_branch(actor, branch_id).await?;
        self.products.stock_by_branch(&actor.tenant_id, &branch.id).await
    }

    pub async fn list_branches(&self, actor: &TenantActor) -> Result<Vec<Branch>, DomainError> {
        self.branches.list_by_tenant(&actor.tenant_id).await
    }

    fn may_receive(actor: &TenantActor, transfer: &StockTransfer) -> bool {
        actor.role.can_receive_anywhere() || actor.branch_id == Some(transfer.to_branch_id)
    }

    fn require_manager(actor: &TenantActor) -> Result<(), DomainError> {
        if actor.role.can_manage_stockflow() {
            Ok(())
        } else {
            Err(DomainError::Forbidden("owner or manager role required".to_string()))
        }
    }

    /// A branch of another tenant reads as missing.
    async fn tenant_branch(&self, actor: &TenantActor, id: &Uuid) -> Result<Branch, DomainError> {
        match self.branches.find_by_id(id).await? {
            Some(branch) if branch.belongs_to(actor.tenant_id) => Ok(branch),
            Some(_) => {
                warn!("Cross-tenant branch access: {} by tenant {}", id, actor.tenant_id);
                Err(DomainError::BranchNotFound)
            }
            None => Err(DomainError::BranchNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::domain::TransferStatus;
    use crate::repositories::{MockBranchRepository, MockProductRepository, MockTransferRepository};

    struct World {
        tenant_id: Uuid,
        jakarta: Branch,
        bandung: Branch,
        product: Product,
    }

    impl World {
        fn new() -> Self {
            let tenant_id = Uuid::new_v4();
            Self {
                tenant_id,
                jakarta: Branch::new(tenant_id, "JKT".into(), "Jakarta".into(), None).unwrap(),
                bandung: Branch::new(tenant_id, "BDG".into(), "Bandung".into(), None).unwrap(),
                product: Product {
                    id: Uuid::new_v4(),
                    tenant_id,
                    sku: "KOPI-250".into(),
                    name: "Kopi Bubuk 250g".into(),
                    price_cents: 4_500_000,
                    is_active: true,
                    created_at: Utc::now(),
                },
            }
        }

        fn actor(&self, role: UserRole, branch: Option<&Branch>) -> TenantActor {
            TenantActor::new(Uuid::new_v4(), self.tenant_id, branch.map(|b| b.id), role)
        }

        fn branches(&self) -> MockBranchRepository {
            let mut repo = MockBranchRepository::new();
            let all = vec![self.jakarta.clone(), self.bandung.clone()];
            repo.expect_find_by_id()
                .returning(move |id| Ok(all.iter().find(|b| b.id == *id).cloned()));
            repo
        }

        fn products(&self) -> MockProductRepository {
            let mut repo = MockProductRepository::new();
            let product = self.product.clone();
            repo.expect_find_many()
                .returning(move |_, ids| Ok(if ids.contains(&product.id) { vec![product.clone()] } else { vec![] }));
            repo
        }

        fn transfer(&self, status: TransferStatus) -> StockTransfer {
            let mut t = StockTransfer::new(
                self.tenant_id,
                self.jakarta.id,
                self.bandung.id,
                &[(self.product.id, 10)],
                None,
                Uuid::new_v4(),
            )
            .unwrap();
            t.status = status;
            t
        }

        fn service(&self, transfers: MockTransferRepository) -> StockflowService {
            StockflowService::new(Arc::new(transfers), Arc::new(self.branches()), Arc::new(self.products()))
        }
    }

    fn returning_transfer(repo: &mut MockTransferRepository, transfer: StockTransfer) {
        repo.expect_find_by_id().returning(move |_, _| Ok(Some(transfer.clone())));
    }

    #[tokio::test]
    async fn test_create_transfer() {
        let w = World::new();
        let mut transfers = MockTransferRepository::new();
        transfers
            .expect_create()
            .withf(|t| t.status == TransferStatus::Pending && t.reference.starts_with("TRF-"))
            .times(1)
            .returning(|t| Ok(t.clone()));

        let actor = w.actor(UserRole::Manager, Some(&w.jakarta));
        let transfer = w
            .service(transfers)
            .create_transfer(
                &actor,
                NewTransfer {
                    from_branch_id: w.jakarta.id,
                    to_branch_id: w.bandung.id,
                    lines: vec![(w.product.id, 12)],
                    notes: Some("restock".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(transfer.total_quantity(), 12);
    }

    #[tokio::test]
    async fn test_create_transfer_rejects_cashier() {
        let w = World::new();
        let actor = w.actor(UserRole::Cashier, Some(&w.jakarta));
        let err = w
            .service(MockTransferRepository::new())
            .create_transfer(
                &actor,
                NewTransfer {
                    from_branch_id: w.jakarta.id,
                    to_branch_id: w.bandung.id,
                    lines: vec![(w.product.id, 1)],
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_create_transfer_rejects_foreign_branch() {
        let w = World::new();
        let foreign = Branch::new(Uuid::new_v4(), "XXX".into(), "Elsewhere".into(), None).unwrap();
        let mut branches = MockBranchRepository::new();
        let known = vec![w.jakarta.clone(), foreign.clone()];
        branches
            .expect_find_by_id()
            .returning(move |id| Ok(known.iter().find(|b| b.id == *id).cloned()));
        let service = StockflowService::new(
            Arc::new(MockTransferRepository::new()),
            Arc::new(branches),
            Arc::new(w.products()),
        );

        let actor = w.actor(UserRole::Owner, None);
        let err = service
            .create_transfer(
                &actor,
                NewTransfer {
                    from_branch_id: w.jakarta.id,
                    to_branch_id: foreign.id,
                    lines: vec![(w.product.id, 1)],
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::BranchNotFound));
    }

    #[tokio::test]
    async fn test_create_transfer_rejects_unknown_product() {
        let w = World::new();
        let actor = w.actor(UserRole::Owner, None);
        let stray = Uuid::new_v4();
        let err = w
            .service(MockTransferRepository::new())
            .create_transfer(
                &actor,
                NewTransfer {
                    from_branch_id: w.jakarta.id,
                    to_branch_id: w.bandung.id,
                    lines: vec![(stray, 1)],
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ProductNotFound(id) if id == stray));
    }

    #[tokio::test]
    async fn test_ship_deducts_from_source() {
        let w = World::new();
        let pending = w.transfer(TransferStatus::Pending);
        let id = pending.id;
        let (jakarta, product) = (w.jakarta.id, w.product.id);

        let mut transfers = MockTransferRepository::new();
        returning_transfer(&mut transfers, pending);
        transfers
            .expect_apply_transition()
            .withf(move |t, from, effects| {
                t.status == TransferStatus::Shipped
                    && *from == TransferStatus::Pending
                    && effects.len() == 1
                    && effects[0].branch_id == jakarta
                    && effects[0].product_id == product
                    && effects[0].delta == -10
            })
            .times(1)
            .returning(|t, _, _| Ok(t.clone()));

        let actor = w.actor(UserRole::Manager, Some(&w.jakarta));
        let shipped = w.service(transfers).ship(&actor, &id).await.unwrap();
        assert_eq!(shipped.status, TransferStatus::Shipped);
    }

    #[tokio::test]
    async fn test_ship_with_short_source_stock_fails() {
        let w = World::new();
        let pending = w.transfer(TransferStatus::Pending);
        let id = pending.id;
        let (jakarta, product) = (w.jakarta.id, w.product.id);

        let mut transfers = MockTransferRepository::new();
        returning_transfer(&mut transfers, pending);
        transfers
            .expect_apply_transition()
            .times(1)
            .returning(move |_, _, _| {
                Err(DomainError::InsufficientStock {
                    product_id: product,
                    branch_id: jakarta,
                })
            });

        let actor = w.actor(UserRole::Owner, None);
        let err = w.service(transfers).ship(&actor, &id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock { product_id, branch_id } if product_id == product && branch_id == jakarta
        ));
    }

    #[tokio::test]
    async fn test_ship_twice_is_invalid_transition() {
        let w = World::new();
        let shipped = w.transfer(TransferStatus::Shipped);
        let id = shipped.id;
        let mut transfers = MockTransferRepository::new();
        returning_transfer(&mut transfers, shipped);
        transfers.expect_apply_transition().never();

        let actor = w.actor(UserRole::Owner, None);
        let err = w.service(transfers).ship(&actor, &id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition { from: TransferStatus::Shipped, action: TransferAction::Ship }
        ));
    }

    #[tokio::test]
    async fn test_cashier_receives_at_own_branch_with_shortfall() {
        let w = World::new();
        let shipped = w.transfer(TransferStatus::Shipped);
        let id = shipped.id;
        let (bandung, product) = (w.bandung.id, w.product.id);

        let mut transfers = MockTransferRepository::new();
        returning_transfer(&mut transfers, shipped);
        transfers
            .expect_apply_transition()
            .withf(move |_, from, effects| {
                *from == TransferStatus::Shipped
                    && effects.len() == 1
                    && effects[0].branch_id == bandung
                    && effects[0].delta == 8
            })
            .returning(|t, _, _| Ok(t.clone()));

        let actor = w.actor(UserRole::Cashier, Some(&w.bandung));
        let received = w.service(transfers).receive(&actor, &id, &[(product, 8)]).await.unwrap();
        assert_eq!(received.status, TransferStatus::Received);
        assert_eq!(received.items[0].shortfall(), 2);
    }

    #[tokio::test]
    async fn test_cashier_cannot_see_other_branches_transfer() {
        let w = World::new();
        let shipped = w.transfer(TransferStatus::Shipped);
        let id = shipped.id;
        let surabaya = Branch::new(w.tenant_id, "SBY".into(), "Surabaya".into(), None).unwrap();

        let mut transfers = MockTransferRepository::new();
        returning_transfer(&mut transfers, shipped);
        transfers.expect_apply_transition().never();

        let actor = w.actor(UserRole::Cashier, Some(&surabaya));
        let err = w.service(transfers).receive(&actor, &id, &[]).await.unwrap_err();
        assert!(matches!(err, DomainError::TransferNotFound));
    }

    #[tokio::test]
    async fn test_cashier_at_source_cannot_receive() {
        let w = World::new();
        let shipped = w.transfer(TransferStatus::Shipped);
        let id = shipped.id;
        let mut transfers = MockTransferRepository::new();
        returning_transfer(&mut transfers, shipped);

        let actor = w.actor(UserRole::Cashier, Some(&w.jakarta));
        let err = w.service(transfers).receive(&actor, &id, &[]).await.unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_cancel_shipped_returns_stock() {
        let w = World::new();
        let shipped = w.transfer(TransferStatus::Shipped);
        let id = shipped.id;
        let jakarta = w.jakarta.id;

        let mut transfers = MockTransferRepository::new();
        returning_transfer(&mut transfers, shipped);
        transfers
            .expect_apply_transition()
            .withf(move |t, _, effects| {
                t.cancel_reason.as_deref() == Some("damaged truck")
                    && effects.iter().all(|e| e.branch_id == jakarta && e.delta == 10)
            })
            .returning(|t, _, _| Ok(t.clone()));

        let actor = w.actor(UserRole::Owner, None);
        let cancelled = w
            .service(transfers)
            .cancel(&actor, &id, Some("damaged truck".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cashier_list_is_forced_to_own_branch() {
        let w = World::new();
        let bandung = w.bandung.id;
        let mut transfers = MockTransferRepository::new();
        transfers
            .expect_list()
            .withf(move |_, filter, _| filter.branch_id == Some(bandung))
            .returning(|_, _, page| Ok(PageResult::new(vec![], 0, page)));

        let actor = w.actor(UserRole::Cashier, Some(&w.bandung));
        let filter = TransferFilter {
            status: None,
            branch_id: Some(w.jakarta.id),
        };
        let page = w
            .service(transfers)
            .list_transfers(&actor, filter, Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_detail_reports_allowed_actions() {
        let w = World::new();
        let pending = w.transfer(TransferStatus::Pending);
        let id = pending.id;
        let mut transfers = MockTransferRepository::new();
        returning_transfer(&mut transfers, pending);

        let actor = w.actor(UserRole::Manager, Some(&w.jakarta));
        let detail = w.service(transfers).transfer_detail(&actor, &id).await.unwrap();
        assert!(detail.can_ship);
        assert!(detail.can_cancel);
        assert!(!detail.can_receive);
        assert_eq!(detail.lines[0].sku, "KOPI-250");
        assert_eq!(detail.to_branch.code, "BDG");
    }
}
