// ============================================================================
// POS Core - Tenant Administration Service
// File: crates/pos-core/src/services/tenant_admin_service.rs
// ============================================================================
//! Super-admin management of tenants and subscription plans

use std::sync::Arc;
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use pos_security::PasswordService;
use pos_shared::{PageResult, Pagination};

use crate::domain::{Branch, SubscriptionPlan, Tenant, User, UserRole};
use crate::error::DomainError;
use crate::repositories::{
    BranchRepository, PlanRepository, PlatformCounts, TenantFilter, TenantRepository, TenantSummary,
    UserRepository,
};

const MAX_SUBSCRIPTION_DAYS: i64 = 3650;

fn check_days(days: i64) -> Result<(), DomainError> {
    if !(1..=MAX_SUBSCRIPTION_DAYS).contains(&days) {
        return Err(DomainError::ValidationError(format!(
            "Subscription days must be between 1 and {}",
            MAX_SUBSCRIPTION_DAYS
        )));
    }
    Ok(())
}

/// Input for onboarding a tenant together with its first owner.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub slug: Option<String>,
    pub plan_code: String,
    /// Subscription length; `None` never expires.
    pub subscription_days: Option<i64>,
    pub owner_email: String,
    pub owner_name: String,
    pub owner_password: String,
}

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub code: String,
    pub name: String,
    pub max_branches: i32,
    pub max_users: i32,
    pub monthly_price_cents: i64,
}

/// Everything the tenant detail page shows.
#[derive(Debug, Clone, Serialize)]
pub struct TenantDetail {
    pub tenant: Tenant,
    pub plan: SubscriptionPlan,
    pub branches: Vec<Branch>,
    pub active_users: i64,
}

pub struct TenantAdminService {
    tenants: Arc<dyn TenantRepository>,
    plans: Arc<dyn PlanRepository>,
    users: Arc<dyn UserRepository>,
    branches: Arc<dyn BranchRepository>,
}

impl TenantAdminService {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        plans: Arc<dyn PlanRepository>,
        users: Arc<dyn UserRepository>,
        branches: Arc<dyn BranchRepository>,
    ) -> Self {
        Self {
            tenants,
            plans,
            users,
            branches,
        }
    }

    pub async fn dashboard(&self) -> Result<PlatformCounts, DomainError> {
        self.tenants.platform_counts().await
    }

    pub async fn list_tenants(
        &self,
        filter: &TenantFilter,
        page: Pagination,
    ) -> Result<PageResult<TenantSummary>, DomainError> {
        self.tenants.list(filter, page).await
    }

    pub async fn get_tenant(&self, id: &Uuid) -> Result<TenantDetail, DomainError> {
        let tenant = self.load_tenant(id).await?;
        let plan = self
            .plans
            .find_by_id(&tenant.plan_id)
            .await?
            .ok_or_else(|| DomainError::PlanNotFound(tenant.plan_id.to_string()))?;
        let branches = self.branches.list_by_tenant(id).await?;
        let active_users = self.users.count_active_by_tenant(id).await?;

        Ok(TenantDetail {
            tenant,
            plan,
            branches,
            active_users,
        })
    }

    pub async fn create_tenant(&self, actor_id: Uuid, input: NewTenant) -> Result<Tenant, DomainError> {
        info!("Creating tenant: {}", input.name);

        let plan = self.active_plan(&input.plan_code).await?;

        let expires_at = match input.subscription_days {
            Some(days) => {
                check_days(days)?;
                Some(Utc::now() + Duration::days(days))
            }
            None => None,
        };

        let tenant = Tenant::new(input.name, input.slug, plan.id, expires_at, Some(actor_id))?;

        if self.tenants.find_by_slug(&tenant.slug).await?.is_some() {
            warn!("Tenant creation failed: slug already exists: {}", tenant.slug);
            return Err(DomainError::TenantSlugAlreadyExists(tenant.slug));
        }

        let owner_email = input.owner_email.trim().to_lowercase();
        if self.users.find_by_email(&owner_email).await?.is_some() {
            return Err(DomainError::EmailAlreadyExists(owner_email));
        }

        PasswordService::check_strength(
            &input.owner_password,
            &[owner_email.as_str(), input.owner_name.as_str(), tenant.name.as_str()],
        )?;
        let password_hash = PasswordService::hash(&input.owner_password)?;

        let owner = User::new(
            tenant.id,
            None,
            owner_email,
            input.owner_name,
            password_hash,
            UserRole::Owner,
            Some(actor_id),
        )?;

        let created = self.tenants.create_with_owner(&tenant, &owner).await?;
        info!("Tenant created successfully: {} ({})", created.slug, created.id);
        Ok(created)
    }

    pub async fn update_tenant(&self, actor_id: Uuid, id: &Uuid, name: String) -> Result<Tenant, DomainError> {
        let mut tenant = self.load_tenant(id).await?;
        tenant.rename(name, actor_id)?;
        self.tenants.update(&tenant).await
    }

    /// Soft delete. The slug stays taken.
    pub async fn delete_tenant(&self, actor_id: Uuid, id: &Uuid) -> Result<(), DomainError> {
        let mut tenant = self.load_tenant(id).await?;
        tenant.soft_delete(actor_id);
        self.tenants.update(&tenant).await?;
        warn!("Tenant {} deleted by {}", tenant.slug, actor_id);
        Ok(())
    }

    pub async fn set_tenant_active(&self, actor_id: Uuid, id: &Uuid, active: bool) -> Result<Tenant, DomainError> {
        let mut tenant = self.load_tenant(id).await?;
        tenant.set_active(active, actor_id);
        let tenant = self.tenants.update(&tenant).await?;
        info!("Tenant {} active = {}", tenant.slug, active);
        Ok(tenant)
    }

    pub async fn extend_subscription(&self, actor_id: Uuid, id: &Uuid, days: i64) -> Result<Tenant, DomainError> {
        check_days(days)?;
        let mut tenant = self.load_tenant(id).await?;
        tenant.extend_subscription(days, actor_id);
        self.tenants.update(&tenant).await
    }

    /// Moves the tenant to another plan. Refused when current usage does not fit.
    pub async fn change_plan(&self, actor_id: Uuid, id: &Uuid, plan_code: &str) -> Result<Tenant, DomainError> {
        let mut tenant = self.load_tenant(id).await?;
        let plan = self.active_plan(plan_code).await?;

        let users = self.users.count_active_by_tenant(id).await?;
        if !plan.allows_users(users) {
            return Err(DomainError::LimitReached(format!(
                "plan {} allows {} users, tenant has {}",
                plan.code, plan.max_users, users
            )));
        }
        let branches = self.branches.count_by_tenant(id).await?;
        if !plan.allows_branches(branches) {
            return Err(DomainError::LimitReached(format!(
                "plan {} allows {} branches, tenant has {}",
                plan.code, plan.max_branches, branches
            )));
        }

        tenant.change_plan(plan.id, actor_id);
        let tenant = self.tenants.update(&tenant).await?;
        info!("Tenant {} moved to plan {}", tenant.slug, plan.code);
        Ok(tenant)
    }

    pub async fn list_plans(&self, include_inactive: bool) -> Result<Vec<SubscriptionPlan>, DomainError> {
        self.plans.list(include_inactive).await
    }

    pub async fn create_plan(&self, input: NewPlan) -> Result<SubscriptionPlan, DomainError> {
        let plan = SubscriptionPlan::new(
            input.code,
            input.name,
            input.max_branches,
            input.max_users,
            input.monthly_price_cents,
        )?;

        if self.plans.find_by_code(&plan.code).await?.is_some() {
            return Err(DomainError::PlanCodeAlreadyExists(plan.code));
        }

        let plan = self.plans.create(&plan).await?;
        info!("Subscription plan created: {}", plan.code);
        Ok(plan)
    }

    /// The plan code is immutable; everything else can be edited. Limits may
    /// not drop below what a tenant on the plan already uses.
    pub async fn update_plan(&self, id: &Uuid, input: NewPlan) -> Result<SubscriptionPlan, DomainError> {
        let mut plan = self.load_plan(id).await?;
        plan.name = input.name.trim().to_string();
        plan.max_branches = input.max_branches;
        plan.max_users = input.max_users;
        plan.monthly_price_cents = input.monthly_price_cents;
        plan.modified_at = Some(Utc::now());
        plan.check()?;

        let usage = self.plans.peak_usage(&plan.id).await?;
        if !plan.allows_users(usage.max_active_users) {
            warn!("Plan {} update refused: a tenant has {} active users", plan.code, usage.max_active_users);
            return Err(DomainError::LimitReached(format!(
                "a tenant on plan {} has {} active users",
                plan.code, usage.max_active_users
            )));
        }
        if !plan.allows_branches(usage.max_active_branches) {
            warn!(
                "Plan {} update refused: a tenant has {} active branches",
                plan.code, usage.max_active_branches
            );
            return Err(DomainError::LimitReached(format!(
                "a tenant on plan {} has {} active branches",
                plan.code, usage.max_active_branches
            )));
        }

        self.plans.update(&plan).await
    }

    pub async fn set_plan_active(&self, id: &Uuid, active: bool) -> Result<SubscriptionPlan, DomainError> {
        let mut plan = self.load_plan(id).await?;
        plan.is_active = active;
        plan.modified_at = Some(Utc::now());
        self.plans.update(&plan).await
    }

    async fn load_tenant(&self, id: &Uuid) -> Result<Tenant, DomainError> {
        self.tenants
            .find_by_id(id)
            .await?
            .filter(|t| !t.is_deleted())
            .ok_or(DomainError::TenantNotFound)
    }

    async fn load_plan(&self, id: &Uuid) -> Result<SubscriptionPlan, DomainError> {
        self.plans
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::PlanNotFound(id.to_string()))
    }

    async fn active_plan(&self, code: &str) -> Result<SubscriptionPlan, DomainError> {
        let code = code.trim().to_lowercase();
        self.plans
            .find_by_code(&code)
            .await?
            .filter(|p| p.is_active)
            .ok_or(DomainError::PlanNotFound(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{
        MockBranchRepository, MockPlanRepository, MockTenantRepository, MockUserRepository, PlanUsage,
    };

    struct Mocks {
        tenants: MockTenantRepository,
        plans: MockPlanRepository,
        users: MockUserRepository,
        branches: MockBranchRepository,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                tenants: MockTenantRepository::new(),
                plans: MockPlanRepository::new(),
                users: MockUserRepository::new(),
                branches: MockBranchRepository::new(),
            }
        }

        fn into_service(self) -> TenantAdminService {
            TenantAdminService::new(
                Arc::new(self.tenants),
                Arc::new(self.plans),
                Arc::new(self.users),
                Arc::new(self.branches),
            )
        }
    }

    fn plan(code: &str, max_branches: i32, max_users: i32) -> SubscriptionPlan {
        SubscriptionPlan::new(code.into(), code.to_uppercase(), max_branches, max_users, 0).unwrap()
    }

    fn new_tenant() -> NewTenant {
        NewTenant {
            name: "Warung Sejahtera".into(),
            slug: None,
            plan_code: "basic".into(),
            subscription_days: Some(30),
            owner_email: "Owner@Sejahtera.id".into(),
            owner_name: "Ibu Sejahtera".into(),
            owner_password: "Kas-Besar-Rak-77!".into(),
        }
    }

    #[tokio::test]
    async fn test_create_tenant_with_owner() {
        let mut m = Mocks::new();
        let basic = plan("basic", 3, 10);
        let plan_id = basic.id;
        m.plans.expect_find_by_code().returning(move |_| Ok(Some(basic.clone())));
        m.tenants.expect_find_by_slug().returning(|_| Ok(None));
        m.users.expect_find_by_email().returning(|_| Ok(None));
        m.tenants
            .expect_create_with_owner()
            .withf(move |t, owner| {
                t.slug == "warung-sejahtera"
                    && t.plan_id == plan_id
                    && t.subscription_expires_at.is_some()
                    && owner.tenant_id == t.id
                    && owner.role == UserRole::Owner
                    && owner.email == "owner@sejahtera.id"
                    && owner.password_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(|t, _| Ok(t.clone()));

        let tenant = m.into_service().create_tenant(Uuid::new_v4(), new_tenant()).await.unwrap();
        assert_eq!(tenant.slug, "warung-sejahtera");
    }

    #[tokio::test]
    async fn test_create_tenant_duplicate_slug() {
        let mut m = Mocks::new();
        let basic = plan("basic", 3, 10);
        m.plans.expect_find_by_code().returning(move |_| Ok(Some(basic.clone())));
        m.tenants.expect_find_by_slug().returning(|_| {
            Ok(Some(Tenant::new("Warung Sejahtera".into(), None, Uuid::new_v4(), None, None).unwrap()))
        });
        m.tenants.expect_create_with_owner().never();

        let err = m.into_service().create_tenant(Uuid::new_v4(), new_tenant()).await.unwrap_err();
        assert!(matches!(err, DomainError::TenantSlugAlreadyExists(s) if s == "warung-sejahtera"));
    }

    #[tokio::test]
    async fn test_create_tenant_inactive_plan() {
        let mut m = Mocks::new();
        let mut retired = plan("basic", 3, 10);
        retired.is_active = false;
        m.plans.expect_find_by_code().returning(move |_| Ok(Some(retired.clone())));

        let err = m.into_service().create_tenant(Uuid::new_v4(), new_tenant()).await.unwrap_err();
        assert!(matches!(err, DomainError::PlanNotFound(_)));
    }

    #[tokio::test]
    async fn test_create_tenant_weak_owner_password() {
        let mut m = Mocks::new();
        let basic = plan("basic", 3, 10);
        m.plans.expect_find_by_code().returning(move |_| Ok(Some(basic.clone())));
        m.tenants.expect_find_by_slug().returning(|_| Ok(None));
        m.users.expect_find_by_email().returning(|_| Ok(None));

        let mut input = new_tenant();
        input.owner_password = "password".into();
        let err = m.into_service().create_tenant(Uuid::new_v4(), input).await.unwrap_err();
        assert!(matches!(err, DomainError::PasswordTooWeak));
    }

    #[tokio::test]
    async fn test_change_plan_refused_when_usage_exceeds() {
        let mut m = Mocks::new();
        let tenant = Tenant::new("Toko".into(), None, Uuid::new_v4(), None, None).unwrap();
        let tenant_id = tenant.id;
        m.tenants.expect_find_by_id().returning(move |_| Ok(Some(tenant.clone())));
        let small = plan("starter", 1, 2);
        m.plans.expect_find_by_code().returning(move |_| Ok(Some(small.clone())));
        m.users.expect_count_active_by_tenant().returning(|_| Ok(5));
        m.tenants.expect_update().never();

        let err = m
            .into_service()
            .change_plan(Uuid::new_v4(), &tenant_id, "starter")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::LimitReached(_)));
    }

    #[tokio::test]
    async fn test_change_plan_success() {
        let mut m = Mocks::new();
        let tenant = Tenant::new("Toko".into(), None, Uuid::new_v4(), None, None).unwrap();
        let tenant_id = tenant.id;
        m.tenants.expect_find_by_id().returning(move |_| Ok(Some(tenant.clone())));
        let pro = plan("pro", 10, 50);
        let pro_id = pro.id;
        m.plans.expect_find_by_code().returning(move |_| Ok(Some(pro.clone())));
        m.users.expect_count_active_by_tenant().returning(|_| Ok(5));
        m.branches.expect_count_by_tenant().returning(|_| Ok(2));
        m.tenants
            .expect_update()
            .withf(move |t| t.plan_id == pro_id)
            .returning(|t| Ok(t.clone()));

        let tenant = m.into_service().change_plan(Uuid::new_v4(), &tenant_id, "PRO").await.unwrap();
        assert_eq!(tenant.plan_id, pro_id);
    }

    #[tokio::test]
    async fn test_deleted_tenant_is_not_found() {
        let mut m = Mocks::new();
        let mut tenant = Tenant::new("Toko".into(), None, Uuid::new_v4(), None, None).unwrap();
        tenant.soft_delete(Uuid::new_v4());
        let id = tenant.id;
        m.tenants.expect_find_by_id().returning(move |_| Ok(Some(tenant.clone())));

        let err = m.into_service().set_tenant_active(Uuid::new_v4(), &id, true).await.unwrap_err();
        assert!(matches!(err, DomainError::TenantNotFound));
    }

    #[tokio::test]
    async fn test_create_plan_duplicate_code() {
        let mut m = Mocks::new();
        m.plans
            .expect_find_by_code()
            .returning(|_| Ok(Some(SubscriptionPlan::new("pro".into(), "Pro".into(), 1, 1, 0).unwrap())));
        m.plans.expect_create().never();

        let err = m
            .into_service()
            .create_plan(NewPlan {
                code: "pro".into(),
                name: "Pro".into(),
                max_branches: 5,
                max_users: 20,
                monthly_price_cents: 250_000,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PlanCodeAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_create_tenant_rejects_out_of_range_days() {
        for days in [0, -5, 3651, 9_999_999_999_999] {
            let mut m = Mocks::new();
            let basic = plan("basic", 3, 10);
            m.plans.expect_find_by_code().returning(move |_| Ok(Some(basic.clone())));
            m.tenants.expect_create_with_owner().never();

            let mut input = new_tenant();
            input.subscription_days = Some(days);
            let err = m.into_service().create_tenant(Uuid::new_v4(), input).await.unwrap_err();
            assert!(matches!(err, DomainError::ValidationError(_)), "days = {}", days);
        }
    }

    #[tokio::test]
    async fn test_extend_subscription_rejects_huge_extension() {
        let mut m = Mocks::new();
        m.tenants.expect_find_by_id().never();
        m.tenants.expect_update().never();

        let err = m
            .into_service()
            .extend_subscription(Uuid::new_v4(), &Uuid::new_v4(), i64::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError(_)));
    }

    fn plan_edit(max_branches: i32, max_users: i32) -> NewPlan {
        NewPlan {
            code: "basic".into(),
            name: "Basic".into(),
            max_branches,
            max_users,
            monthly_price_cents: 150_000,
        }
    }

    #[tokio::test]
    async fn test_update_plan_refused_below_tenant_usage() {
        let mut m = Mocks::new();
        let basic = plan("basic", 3, 10);
        let id = basic.id;
        m.plans.expect_find_by_id().returning(move |_| Ok(Some(basic.clone())));
        m.plans.expect_peak_usage().withf(move |p| *p == id).returning(|_| {
            Ok(PlanUsage {
                max_active_users: 4,
                max_active_branches: 2,
            })
        });
        m.plans.expect_update().never();
        let service = m.into_service();

        let err = service.update_plan(&id, plan_edit(3, 1)).await.unwrap_err();
        assert!(matches!(err, DomainError::LimitReached(msg) if msg.contains("4 active users")));

        let err = service.update_plan(&id, plan_edit(1, 10)).await.unwrap_err();
        assert!(matches!(err, DomainError::LimitReached(msg) if msg.contains("2 active branches")));
    }

    #[tokio::test]
    async fn test_update_plan_within_usage() {
        let mut m = Mocks::new();
        let basic = plan("basic", 3, 10);
        let id = basic.id;
        m.plans.expect_find_by_id().returning(move |_| Ok(Some(basic.clone())));
        m.plans.expect_peak_usage().returning(|_| {
            Ok(PlanUsage {
                max_active_users: 4,
                max_active_branches: 2,
            })
        });
        m.plans
            .expect_update()
            .withf(|p| p.code == "basic" && p.max_users == 4 && p.max_branches == 2)
            .times(1)
            .returning(|p| Ok(p.clone()));

        let updated = m.into_service().update_plan(&id, plan_edit(2, 4)).await.unwrap();
        assert_eq!(updated.monthly_price_cents, 150_000);
    }
}
