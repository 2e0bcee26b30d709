//! Referral links and bonuses for the in-memory ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{LedgerStoreError, ReferralRepository};
use crate::domain::{BonusCause, ReferralAttachment, ReferralBonus, ReferredUser, UserId};

use super::{MemoryLedgerStore, ReferralRow, missing_user};

#[async_trait]
impl ReferralRepository for MemoryLedgerStore {
    async fn attach_referrer(
        &self,
        referred: UserId,
        referrer: UserId,
        registration_bonus: i64,
        now: DateTime<Utc>,
    ) -> Result<ReferralAttachment, LedgerStoreError> {
        let mut state = self.lock()?;
        for id in [referred, referrer] {
            if !state.users.contains_key(&id) {
                return Err(missing_user(id));
            }
        }
        if referred == referrer {
            return Ok(ReferralAttachment::SelfReferral);
        }
        if state.referrals.contains_key(&referred) {
            return Ok(ReferralAttachment::AlreadyReferred);
        }
        if state
            .referrals
            .get(&referrer)
            .is_some_and(|row| row.referrer_id == referred)
        {
            return Ok(ReferralAttachment::Circular);
        }

        state.referrals.insert(
            referred,
            ReferralRow {
                referrer_id: referrer,
                created_at: now,
            },
        );
        let bonus = state
            .pay_referrer(referred, registration_bonus, BonusCause::Registration)?
            .unwrap_or(ReferralBonus {
                referrer_id: referrer,
                referred_id: referred,
                amount: 0,
                cause: BonusCause::Registration,
            });
        Ok(ReferralAttachment::Attached(bonus))
    }

    async fn referrer_of(&self, user: UserId) -> Result<Option<UserId>, LedgerStoreError> {
        Ok(self
            .lock()?
            .referrals
            .get(&user)
            .map(|row| row.referrer_id))
    }

    async fn referral_totals(&self, referrer: UserId) -> Result<(i64, i64), LedgerStoreError> {
        let state = self.lock()?;
        let referred = state
            .referrals
            .values()
            .filter(|row| row.referrer_id == referrer)
            .count();
        let earned = state
            .bonuses
            .iter()
            .filter(|bonus| bonus.referrer_id == referrer)
            .map(|bonus| bonus.amount)
            .sum();
        Ok((i64::try_from(referred).unwrap_or(i64::MAX), earned))
    }

    async fn referrals(&self, referrer: UserId) -> Result<Vec<ReferredUser>, LedgerStoreError> {
        let state = self.lock()?;
        let mut referred: Vec<ReferredUser> = state
            .referrals
            .iter()
            .filter(|(_, row)| row.referrer_id == referrer)
            .filter_map(|(id, row)| {
                let user = state.users.get(id)?;
                let bonus_earned = state
                    .bonuses
                    .iter()
                    .filter(|bonus| bonus.referrer_id == referrer && bonus.referred_id == *id)
                    .map(|bonus| bonus.amount)
                    .sum();
                Some(ReferredUser {
                    user_id: user.id,
                    external_id: user.external_id,
                    username: user.username.clone(),
                    joined_at: row.created_at,
                    bonus_earned,
                })
            })
            .collect();
        referred.sort_by(|a, b| b.joined_at.cmp(&a.joined_at).then(b.user_id.cmp(&a.user_id)));
        Ok(referred)
    }
}
