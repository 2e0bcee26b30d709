//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Each port gets its own adapter sharing one `bb8` pool through
//! `diesel-async`. Row structs (`models.rs`) and table definitions
//! (`schema.rs`) stay private to this module. Multi-row mutations run in a
//! single transaction and lock the link row they depend on, so the
//! invariants the domain checks hold under concurrent writers.
//!
//! # Example
//!
//! ```ignore
//! use reciprocity::outbound::persistence::{DbPool, DieselStores, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/ledger")).await?;
//! let stores = DieselStores::new(pool);
//! ```

use std::sync::Arc;

mod diesel_credit_ledger;
mod diesel_link_repository;
mod diesel_moderation_repository;
mod diesel_referral_repository;
mod diesel_task_repository;
mod diesel_user_repository;
mod error_mapping;
mod ledger_queries;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_credit_ledger::DieselCreditLedger;
pub use diesel_link_repository::DieselLinkRepository;
pub use diesel_moderation_repository::DieselModerationRepository;
pub use diesel_referral_repository::DieselReferralRepository;
pub use diesel_task_repository::DieselTaskRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use migrations::run_pending_migrations;
pub use pool::{DbPool, PoolConfig, PoolError};

/// Every Diesel adapter built over one pool.
#[derive(Clone)]
pub struct DieselStores {
    pub users: Arc<DieselUserRepository>,
    pub ledger: Arc<DieselCreditLedger>,
    pub tasks: Arc<DieselTaskRepository>,
    pub links: Arc<DieselLinkRepository>,
    pub moderation: Arc<DieselModerationRepository>,
    pub referrals: Arc<DieselReferralRepository>,
}

impl DieselStores {
    pub fn new(pool: DbPool) -> Self {
        Self {
            users: Arc::new(DieselUserRepository::new(pool.clone())),
            ledger: Arc::new(DieselCreditLedger::new(pool.clone())),
            tasks: Arc::new(DieselTaskRepository::new(pool.clone())),
            links: Arc::new(DieselLinkRepository::new(pool.clone())),
            moderation: Arc::new(DieselModerationRepository::new(pool.clone())),
            referrals: Arc::new(DieselReferralRepository::new(pool)),
        }
    }
}
