//! PostgreSQL-backed `ReferralRepository` implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};

use crate::domain::ports::{LedgerStoreError, ReferralRepository};
use crate::domain::{
    BonusCause, ExternalUserId, ReferralAttachment, ReferralBonus, ReferredUser, UserId,
};

use super::error_mapping::map_pool_error;
use super::ledger_queries::{load_user, pay_referrer};
use super::models::NewReferralRow;
use super::pool::DbPool;
use super::schema::{referral_bonuses, referrals, users};

/// Diesel-backed referral links and bonus ledger.
#[derive(Clone)]
pub struct DieselReferralRepository {
    pool: DbPool,
}

impl DieselReferralRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferralRepository for DieselReferralRepository {
    async fn attach_referrer(
        &self,
        referred: UserId,
        referrer: UserId,
        registration_bonus: i64,
        now: DateTime<Utc>,
    ) -> Result<ReferralAttachment, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                for id in [referred, referrer] {
                    if load_user(conn, id).await?.is_none() {
                        return Err(LedgerStoreError::integrity(format!("user {id} not found")));
                    }
                }
                if referred == referrer {
                    return Ok(ReferralAttachment::SelfReferral);
                }
                let referrer_of = |user: UserId| {
                    referrals::table
                        .find(user.get())
                        .select(referrals::referrer_id)
                };
                let existing: Option<i64> = referrer_of(referred).first(conn).await.optional()?;
                if existing.is_some() {
                    return Ok(ReferralAttachment::AlreadyReferred);
                }
                let upstream: Option<i64> = referrer_of(referrer).first(conn).await.optional()?;
                if upstream == Some(referred.get()) {
                    return Ok(ReferralAttachment::Circular);
                }
                diesel::insert_into(referrals::table)
                    .values(&NewReferralRow {
                        referred_id: referred.get(),
                        referrer_id: referrer.get(),
                        created_at: now,
                    })
                    .execute(conn)
                    .await?;

                let bonus = pay_referrer(
                    conn,
                    referred,
                    registration_bonus,
                    BonusCause::Registration,
                    now,
                )
                .await?
                .unwrap_or(ReferralBonus {
                    referrer_id: referrer,
                    referred_id: referred,
                    amount: 0,
                    cause: BonusCause::Registration,
                });
                Ok(ReferralAttachment::Attached(bonus))
            }
            .scope_boxed()
        })
        .await
    }

    async fn referrer_of(&self, user: UserId) -> Result<Option<UserId>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let referrer: Option<i64> = referrals::table
            .find(user.get())
            .select(referrals::referrer_id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(referrer.map(UserId::new))
    }

    async fn referral_totals(&self, referrer: UserId) -> Result<(i64, i64), LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let referred: i64 = referrals::table
            .filter(referrals::referrer_id.eq(referrer.get()))
            .count()
            .get_result(&mut conn)
            .await?;
        let amounts: Vec<i64> = referral_bonuses::table
            .filter(referral_bonuses::referrer_id.eq(referrer.get()))
            .select(referral_bonuses::amount)
            .load(&mut conn)
            .await?;
        Ok((referred, amounts.iter().sum()))
    }

    async fn referrals(&self, referrer: UserId) -> Result<Vec<ReferredUser>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(i64, DateTime<Utc>, i64, Option<String>)> = referrals::table
            .inner_join(users::table.on(users::id.eq(referrals::referred_id)))
            .filter(referrals::referrer_id.eq(referrer.get()))
            .order((referrals::created_at.desc(), referrals::referred_id.desc()))
            .select((
                referrals::referred_id,
                referrals::created_at,
                users::external_id,
                users::username,
            ))
            .load(&mut conn)
            .await?;
        let bonuses: Vec<(i64, i64)> = referral_bonuses::table
            .filter(referral_bonuses::referrer_id.eq(referrer.get()))
            .select((referral_bonuses::referred_id, referral_bonuses::amount))
            .load(&mut conn)
            .await?;
        let mut earned: HashMap<i64, i64> = HashMap::new();
        for (referred, amount) in bonuses {
            *earned.entry(referred).or_insert(0) += amount;
        }

        Ok(rows
            .into_iter()
            .map(|(user_id, joined_at, external_id, username)| ReferredUser {
                user_id: UserId::new(user_id),
                external_id: ExternalUserId::new(external_id),
                username,
                joined_at,
                bonus_earned: earned.get(&user_id).copied().unwrap_or(0),
            })
            .collect())
    }
}
