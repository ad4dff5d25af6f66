// ============================================================================
// POS Core - Loyalty Service
// File: crates/pos-core/src/services/loyalty_service.rs
// ============================================================================
//! Stamp programs, customer cards and the stamp ledger

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use pos_shared::{PageResult, Pagination};

use crate::domain::{Customer, LoyaltyEntry, LoyaltyProgram, StampCard, TenantActor};
use crate::error::DomainError;
use crate::repositories::{CustomerRepository, LedgerLine, LoyaltyRepository, MemberBalance};

#[derive(Debug, Clone)]
pub struct NewProgram {
    pub name: String,
    pub stamps_required: i32,
    pub reward_description: String,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Program page: members with their balances plus a page of the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramOverview {
    pub program: LoyaltyProgram,
    pub members: Vec<MemberBalance>,
    pub ledger: PageResult<LedgerLine>,
}

pub struct LoyaltyService {
    loyalty: Arc<dyn LoyaltyRepository>,
    customers: Arc<dyn CustomerRepository>,
}

impl LoyaltyService {
    pub fn new(loyalty: Arc<dyn LoyaltyRepository>, customers: Arc<dyn CustomerRepository>) -> Self {
        Self { loyalty, customers }
    }

    pub async fn list_programs(&self, actor: &TenantActor) -> Result<Vec<LoyaltyProgram>, DomainError> {
        self.loyalty.list_programs(&actor.tenant_id).await
    }

    pub async fn create_program(&self, actor: &TenantActor, input: NewProgram) -> Result<LoyaltyProgram, DomainError> {
        Self::require_manager(actor)?;
        let program = LoyaltyProgram::new(
            actor.tenant_id,
            input.name,
            input.stamps_required,
            input.reward_description,
            input.valid_until,
        )?;
        let program = self.loyalty.create_program(&program).await?;
        info!("Loyalty program '{}' created ({} stamps)", program.name, program.stamps_required);
        Ok(program)
    }

    pub async fn update_program(
        &self,
        actor: &TenantActor,
        id: &Uuid,
        input: NewProgram,
    ) -> Result<LoyaltyProgram, DomainError> {
        Self::require_manager(actor)?;
        let mut program = self.load_program(actor, id).await?;
        program.update(input.name, input.stamps_required, input.reward_description, input.valid_until)?;
        self.loyalty.update_program(&program).await
    }

    pub async fn set_program_active(
        &self,
        actor: &TenantActor,
        id: &Uuid,
        active: bool,
    ) -> Result<LoyaltyProgram, DomainError> {
        Self::require_manager(actor)?;
        let mut program = self.load_program(actor, id).await?;
        program.set_active(active);
        let program = self.loyalty.update_program(&program).await?;
        info!("Loyalty program '{}' active = {}", program.name, active);
        Ok(program)
    }

    pub async fn program_overview(
        &self,
        actor: &TenantActor,
        id: &Uuid,
        page: Pagination,
    ) -> Result<ProgramOverview, DomainError> {
        Self::require_manager(actor)?;
        let program = self.load_program(actor, id).await?;
        let members = self.loyalty.members(&program.id).await?;
        let ledger = self.loyalty.ledger(&program.id, page).await?;
        Ok(ProgramOverview {
            program,
            members,
            ledger,
        })
    }

    pub async fn stamp_card(
        &self,
        actor: &TenantActor,
        program_id: &Uuid,
        customer_id: &Uuid,
    ) -> Result<StampCard, DomainError> {
        let program = self.load_program(actor, program_id).await?;
        let customer = self.load_customer(actor, customer_id).await?;
        let balance = self.loyalty.balance(&program.id, &customer.id).await?;
        Ok(StampCard::new(customer.id, &program, balance))
    }

    pub async fn earn_stamps(
        &self,
        actor: &TenantActor,
        program_id: &Uuid,
        customer_id: &Uuid,
        stamps: i32,
        note: Option<String>,
    ) -> Result<StampCard, DomainError> {
        let program = self.load_program(actor, program_id).await?;
        let customer = self.load_customer(actor, customer_id).await?;
        let entry = LoyaltyEntry::earn(&program, customer.id, stamps, note, actor.user_id)?;
        self.post(&program, entry).await
    }

    /// Fails with `InsufficientStamps` when the card does not cover a reward.
    pub async fn redeem_reward(
        &self,
        actor: &TenantActor,
        program_id: &Uuid,
        customer_id: &Uuid,
        note: Option<String>,
    ) -> Result<StampCard, DomainError> {
        let program = self.load_program(actor, program_id).await?;
        let customer = self.load_customer(actor, customer_id).await?;
        let entry = LoyaltyEntry::redeem(&program, customer.id, note, actor.user_id)?;
        let card = self.post(&program, entry).await?;
        info!("Reward redeemed in '{}' for customer {}", program.name, customer.id);
        Ok(card)
    }

    pub async fn adjust_stamps(
        &self,
        actor: &TenantActor,
        program_id: &Uuid,
        customer_id: &Uuid,
        stamps: i32,
        note: Option<String>,
    ) -> Result<StampCard, DomainError> {
        Self::require_manager(actor)?;
        let program = self.load_program(actor, program_id).await?;
        let customer = self.load_customer(actor, customer_id).await?;
        let entry = LoyaltyEntry::adjust(&program, customer.id, stamps, note, actor.user_id)?;
        let card = self.post(&program, entry).await?;
        info!("Stamp adjustment of {} in '{}' by {}", stamps, program.name, actor.user_id);
        Ok(card)
    }

    pub async fn list_customers(
        &self,
        actor: &TenantActor,
        search: Option<String>,
        page: Pagination,
    ) -> Result<PageResult<Customer>, DomainError> {
        let search = search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        self.customers.list(&actor.tenant_id, search, page).await
    }

    pub async fn create_customer(
        &self,
        actor: &TenantActor,
        name: String,
        phone: Option<String>,
        email: Option<String>,
    ) -> Result<Customer, DomainError> {
        let customer = Customer::new(actor.tenant_id, name, phone, email)?;
        self.customers.create(&customer).await
    }

    async fn post(&self, program: &LoyaltyProgram, entry: LoyaltyEntry) -> Result<StampCard, DomainError> {
        let balance = self.loyalty.append_entry(&entry).await?;
        Ok(StampCard::new(entry.customer_id, program, balance))
    }

    async fn load_program(&self, actor: &TenantActor, id: &Uuid) -> Result<LoyaltyProgram, DomainError> {
        self.loyalty
            .find_program(&actor.tenant_id, id)
            .await?
            .ok_or(DomainError::ProgramNotFound)
    }

    async fn load_customer(&self, actor: &TenantActor, id: &Uuid) -> Result<Customer, DomainError> {
        self.customers
            .find_by_id(&actor.tenant_id, id)
            .await?
            .ok_or(DomainError::CustomerNotFound)
    }

    fn require_manager(actor: &TenantActor) -> Result<(), DomainError> {
        if actor.role.can_manage_loyalty() {
            Ok(())
        } else {
            Err(DomainError::Forbidden("owner or manager role required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntryType, UserRole};
    use crate::repositories::{MockCustomerRepository, MockLoyaltyRepository};
    use fake::faker::name::en::Name;
    use fake::Fake;

    struct Setup {
        actor: TenantActor,
        program: LoyaltyProgram,
        customer: Customer,
        loyalty: MockLoyaltyRepository,
    }

    impl Setup {
        fn new(role: UserRole) -> Self {
            let tenant_id = Uuid::new_v4();
            let program =
                LoyaltyProgram::new(tenant_id, "Kopi Kesepuluh".into(), 10, "Free latte".into(), None).unwrap();
            let customer = Customer::new(tenant_id, Name().fake(), None, None).unwrap();

            let mut loyalty = MockLoyaltyRepository::new();
            let p = program.clone();
            loyalty.expect_find_program().returning(move |_, _| Ok(Some(p.clone())));

            Self {
                actor: TenantActor::new(Uuid::new_v4(), tenant_id, None, role),
                program,
                customer,
                loyalty,
            }
        }

        fn service(self) -> (LoyaltyService, TenantActor, Uuid, Uuid) {
            let mut customers = MockCustomerRepository::new();
            let c = self.customer.clone();
            customers.expect_find_by_id().returning(move |_, _| Ok(Some(c.clone())));
            (
                LoyaltyService::new(Arc::new(self.loyalty), Arc::new(customers)),
                self.actor,
                self.program.id,
                self.customer.id,
            )
        }
    }

    #[tokio::test]
    async fn test_earn_stamps_returns_card() {
        let mut s = Setup::new(UserRole::Cashier);
        s.loyalty
            .expect_append_entry()
            .withf(|e| e.entry_type == EntryType::Earn && e.stamps == 3)
            .times(1)
            .returning(|_| Ok(13));

        let (service, actor, program, customer) = s.service();
        let card = service.earn_stamps(&actor, &program, &customer, 3, None).await.unwrap();
        assert_eq!(card.balance, 13);
        assert_eq!(card.rewards_available(), 1);
        assert_eq!(card.stamps_to_next_reward(), 7);
    }

    #[tokio::test]
    async fn test_redeem_with_insufficient_balance() {
        let mut s = Setup::new(UserRole::Cashier);
        s.loyalty
            .expect_append_entry()
            .withf(|e| e.entry_type == EntryType::Redeem && e.stamps == -10)
            .returning(|_| Err(DomainError::InsufficientStamps { balance: 4, needed: 10 }));

        let (service, actor, program, customer) = s.service();
        let err = service.redeem_reward(&actor, &program, &customer, None).await.unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStamps { balance: 4, needed: 10 }));
    }

    #[tokio::test]
    async fn test_closed_program_rejects_earn() {
        let mut s = Setup::new(UserRole::Manager);
        s.program.set_active(false);
        let closed = s.program.clone();
        s.loyalty.checkpoint();
        s.loyalty.expect_find_program().returning(move |_, _| Ok(Some(closed.clone())));
        s.loyalty.expect_append_entry().never();

        let (service, actor, program, customer) = s.service();
        let err = service.earn_stamps(&actor, &program, &customer, 1, None).await.unwrap_err();
        assert!(matches!(err, DomainError::ProgramClosed));
    }

    #[tokio::test]
    async fn test_cashier_cannot_adjust() {
        let s = Setup::new(UserRole::Cashier);
        let (service, actor, program, customer) = s.service();
        let err = service
            .adjust_stamps(&actor, &program, &customer, 5, Some("goodwill".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_manager_adjusts_with_note() {
        let mut s = Setup::new(UserRole::Manager);
        s.loyalty
            .expect_append_entry()
            .withf(|e| e.entry_type == EntryType::Adjust && e.stamps == -2 && e.note.as_deref() == Some("double scan"))
            .returning(|_| Ok(1));

        let (service, actor, program, customer) = s.service();
        let card = service
            .adjust_stamps(&actor, &program, &customer, -2, Some("double scan".into()))
            .await
            .unwrap();
        assert_eq!(card.balance, 1);
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let s = Setup::new(UserRole::Owner);
        let mut customers = MockCustomerRepository::new();
        customers.expect_find_by_id().returning(|_, _| Ok(None));
        let service = LoyaltyService::new(Arc::new(s.loyalty), Arc::new(customers));

        let err = service
            .stamp_card(&s.actor, &s.program.id, &Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::CustomerNotFound));
    }
}
