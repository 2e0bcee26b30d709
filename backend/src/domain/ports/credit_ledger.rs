//! Port for atomic balance mutations and purchase records.
//!
//! Every method runs as one atomic unit: a balance change is never observable
//! without the business record that caused it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{PurchaseBundle, PurchaseOutcome, SpendOutcome, UserId};

use super::LedgerStoreError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Add `amount` to the balance and return the new balance. Unknown users
    /// raise [`LedgerStoreError::Integrity`].
    async fn credit(&self, user: UserId, amount: i64) -> Result<i64, LedgerStoreError>;

    /// Remove `amount` from the balance unless that would make it negative.
    async fn spend(&self, user: UserId, amount: i64) -> Result<SpendOutcome, LedgerStoreError>;

    /// Append a purchase row, credit the bundle amount, and pay the buyer's
    /// referrer `referral_bonus` credits tagged as a purchase bonus. A zero
    /// bonus, or a buyer without a referrer, pays nothing.
    async fn record_purchase(
        &self,
        user: UserId,
        bundle: PurchaseBundle,
        referral_bonus: i64,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, LedgerStoreError>;
}
