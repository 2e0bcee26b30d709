//! Port for referral links and the referral bonus ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ReferralAttachment, ReferredUser, UserId};

use super::LedgerStoreError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    /// Link `referred` to `referrer` and pay the registration bonus in one
    /// transaction. A user keeps their first referrer for life.
    async fn attach_referrer(
        &self,
        referred: UserId,
        referrer: UserId,
        registration_bonus: i64,
        now: DateTime<Utc>,
    ) -> Result<ReferralAttachment, LedgerStoreError>;

    async fn referrer_of(&self, user: UserId) -> Result<Option<UserId>, LedgerStoreError>;

    /// Number of users referred and total bonus earned from them.
    async fn referral_totals(&self, referrer: UserId) -> Result<(i64, i64), LedgerStoreError>;

    /// Users referred by `referrer`, most recent first.
    async fn referrals(&self, referrer: UserId) -> Result<Vec<ReferredUser>, LedgerStoreError>;
}
