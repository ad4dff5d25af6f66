//! # POS Core - Domain Module
//! 
//! Domain entities for the POS back-office.

pub mod subscription_plan;
pub mod tenant;
pub mod branch;
pub mod user;
pub mod super_admin;
pub mod actor;
pub mod product;
pub mod stock_transfer;
pub mod customer;
pub mod loyalty;

// Re-export all entities and enums
pub use subscription_plan::SubscriptionPlan;
pub use tenant::Tenant;
pub use branch::Branch;
pub use user::{User, UserRole};
pub use super_admin::SuperAdmin;
pub use actor::TenantActor;
pub use product::{Product, StockLevel};
pub use stock_transfer::{StockEffect, StockTransfer, TransferAction, TransferItem, TransferStatus};
pub use customer::Customer;
pub use loyalty::{EntryType, LoyaltyEntry, LoyaltyProgram, StampCard};
