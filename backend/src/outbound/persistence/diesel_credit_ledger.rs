//! PostgreSQL-backed `CreditLedger` implementation.
//!
//! Balances change through single `UPDATE ... RETURNING` statements so
//! concurrent spends cannot both succeed against the same credits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};

use crate::domain::ports::{CreditLedger, LedgerStoreError};
use crate::domain::{
    BonusCause, Purchase, PurchaseBundle, PurchaseOutcome, SpendOutcome, UserId,
};

use super::error_mapping::map_pool_error;
use super::ledger_queries::{adjust_balance, debit_if_covered, pay_referrer};
use super::models::NewPurchaseRow;
use super::pool::DbPool;
use super::schema::purchases;

/// Diesel-backed credit ledger.
#[derive(Clone)]
pub struct DieselCreditLedger {
    pool: DbPool,
}

impl DieselCreditLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditLedger for DieselCreditLedger {
    async fn credit(&self, user: UserId, amount: i64) -> Result<i64, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        adjust_balance(&mut conn, user, amount).await
    }

    async fn spend(&self, user: UserId, amount: i64) -> Result<SpendOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        Ok(match debit_if_covered(&mut conn, user, amount).await? {
            Ok(balance) => SpendOutcome::Spent { balance },
            Err(balance) => SpendOutcome::InsufficientFunds {
                balance,
                required: amount,
            },
        })
    }

    async fn record_purchase(
        &self,
        user: UserId,
        bundle: PurchaseBundle,
        referral_bonus: i64,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let balance = adjust_balance(conn, user, bundle.amount).await?;
                diesel::insert_into(purchases::table)
                    .values(&NewPurchaseRow {
                        user_id: user.get(),
                        amount: bundle.amount,
                        cost: bundle.cost,
                        created_at: now,
                    })
                    .execute(conn)
                    .await?;
                let referral_bonus =
                    pay_referrer(conn, user, referral_bonus, BonusCause::Purchase, now).await?;
                Ok(PurchaseOutcome::Recorded {
                    purchase: Purchase {
                        user_id: user,
                        amount: bundle.amount,
                        cost: bundle.cost,
                        created_at: now,
                    },
                    balance,
                    referral_bonus,
                })
            }
            .scope_boxed()
        })
        .await
    }
}
