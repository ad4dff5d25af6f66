// ============================================================================
// POS Core - Loyalty Entities
// File: crates/pos-core/src/domain/loyalty.rs
// Description: Stamp-card programs and their append-only ledger
// ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainError;

/// Stamp program: collect `stamps_required` stamps, get the reward.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoyaltyProgram {
    pub id: Uuid,
    pub tenant_id: Uuid,

    #[validate(length(min = 2, max = 100, message = "Program name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(range(min = 1, max = 100, message = "Stamps required must be between 1 and 100"))]
    pub stamps_required: i32,

    #[validate(length(min = 2, max = 500, message = "Reward description must be between 2 and 500 characters"))]
    pub reward_description: String,

    pub is_active: bool,
    pub valid_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl LoyaltyProgram {
    pub fn new(
        tenant_id: Uuid,
        name: String,
        stamps_required: i32,
        reward_description: String,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<Self, DomainError> {
        let program = Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.trim().to_string(),
            stamps_required,
            reward_description: reward_description.trim().to_string(),
            is_active: true,
            valid_until,
            created_at: Utc::now(),
            modified_at: None,
        };
        program.validate()?;
        Ok(program)
    }

    pub fn update(
        &mut self,
        name: String,
        stamps_required: i32,
        reward_description: String,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        self.name = name.trim().to_string();
        self.stamps_required = stamps_required;
        self.reward_description = reward_description.trim().to_string();
        self.valid_until = valid_until;
        self.modified_at = Some(Utc::now());
        self.validate()?;
        Ok(())
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.modified_at = Some(Utc::now());
    }

    /// Active and not past its end date. Closed programs accept no new stamps
    /// or redemptions, but manual adjustments still go through.
    pub fn is_open(&self) -> bool {
        self.is_active && self.valid_until.map_or(true, |until| until > Utc::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Earn,
    Redeem,
    Adjust,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Earn => "earn",
            EntryType::Redeem => "redeem",
            EntryType::Adjust => "adjust",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "earn" => Some(EntryType::Earn),
            "redeem" => Some(EntryType::Redeem),
            "adjust" => Some(EntryType::Adjust),
            _ => None,
        }
    }
}

/// One ledger line. Balances are the sum of `stamps` per customer and program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub program_id: Uuid,
    pub customer_id: Uuid,
    pub entry_type: EntryType,
    pub stamps: i32,
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LoyaltyEntry {
    fn build(
        program: &LoyaltyProgram,
        customer_id: Uuid,
        entry_type: EntryType,
        stamps: i32,
        note: Option<String>,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: program.tenant_id,
            program_id: program.id,
            customer_id,
            entry_type,
            stamps,
            note: note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn earn(
        program: &LoyaltyProgram,
        customer_id: Uuid,
        stamps: i32,
        note: Option<String>,
        created_by: Uuid,
    ) -> Result<Self, DomainError> {
        if !program.is_open() {
            return Err(DomainError::ProgramClosed);
        }
        if stamps <= 0 || stamps > program.stamps_required {
            return Err(DomainError::ValidationError(format!(
                "Stamps earned must be between 1 and {}",
                program.stamps_required
            )));
        }
        Ok(Self::build(program, customer_id, EntryType::Earn, stamps, note, created_by))
    }

    /// Spends one reward's worth of stamps. The balance check happens where
    /// the balance is known (the repository, under a lock).
    pub fn redeem(
        program: &LoyaltyProgram,
        customer_id: Uuid,
        note: Option<String>,
        created_by: Uuid,
    ) -> Result<Self, DomainError> {
        if !program.is_open() {
            return Err(DomainError::ProgramClosed);
        }
        Ok(Self::build(
            program,
            customer_id,
            EntryType::Redeem,
            -program.stamps_required,
            note,
            created_by,
        ))
    }

    pub fn adjust(
        program: &LoyaltyProgram,
        customer_id: Uuid,
        stamps: i32,
        note: Option<String>,
        created_by: Uuid,
    ) -> Result<Self, DomainError> {
        if stamps == 0 {
            return Err(DomainError::ValidationError("Adjustment cannot be zero".to_string()));
        }
        if note.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return Err(DomainError::ValidationError("Adjustments need a note".to_string()));
        }
        Ok(Self::build(program, customer_id, EntryType::Adjust, stamps, note, created_by))
    }
}

/// A customer's balance in one program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StampCard {
    pub customer_id: Uuid,
    pub program_id: Uuid,
    pub balance: i64,
    pub stamps_required: i32,
}

impl StampCard {
    pub fn new(customer_id: Uuid, program: &LoyaltyProgram, balance: i64) -> Self {
        Self {
            customer_id,
            program_id: program.id,
            balance,
            stamps_required: program.stamps_required,
        }
    }

    pub fn rewards_available(&self) -> i64 {
        if self.stamps_required <= 0 {
            return 0;
        }
        self.balance.max(0) / self.stamps_required as i64
    }

    pub fn stamps_to_next_reward(&self) -> i64 {
        let required = self.stamps_required.max(1) as i64;
        required - self.balance.max(0) % required
    }
}
