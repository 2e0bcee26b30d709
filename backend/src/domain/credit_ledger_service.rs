//! Credit ledger service: credits, spends, and purchases.

use std::sync::Arc;

use mockable::Clock;
use tracing::info;

use super::ports::CreditLedger;
use super::service_support::map_store_error;
use super::{DomainResult, EconomyConfig, Error, PurchaseOutcome, SpendOutcome, UserId};

#[derive(Clone)]
pub struct CreditLedgerService<L> {
    ledger: Arc<L>,
    economy: Arc<EconomyConfig>,
    clock: Arc<dyn Clock>,
}

impl<L> CreditLedgerService<L> {
    pub fn new(ledger: Arc<L>, economy: Arc<EconomyConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            economy,
            clock,
        }
    }
}

impl<L: CreditLedger> CreditLedgerService<L> {
    fn ensure_positive(amount: i64) -> DomainResult<()> {
        if amount <= 0 {
            return Err(Error::invalid_request(format!(
                "amount must be positive, got {amount}"
            )));
        }
        Ok(())
    }

    /// Add credits to a balance; returns the new balance.
    pub async fn credit(&self, user: UserId, amount: i64) -> DomainResult<i64> {
        Self::ensure_positive(amount)?;
        let balance = self
            .ledger
            .credit(user, amount)
            .await
            .map_err(map_store_error)?;
        info!(user_id = %user, amount, balance, "credits added");
        Ok(balance)
    }

    /// Remove credits unless the balance is too small.
    pub async fn spend(&self, user: UserId, amount: i64) -> DomainResult<SpendOutcome> {
        Self::ensure_positive(amount)?;
        let outcome = self
            .ledger
            .spend(user, amount)
            .await
            .map_err(map_store_error)?;
        info!(user_id = %user, amount, ?outcome, "spend attempted");
        Ok(outcome)
    }

    /// Record a top-up of one of the configured bundles.
    ///
    /// The buyer's referrer earns the configured share of the monetary cost,
    /// not of the credited amount.
    pub async fn purchase(&self, user: UserId, amount: i64) -> DomainResult<PurchaseOutcome> {
        let Some(bundle) = self.economy.bundle_for(amount) else {
            return Ok(PurchaseOutcome::UnknownBundle { amount });
        };
        let bonus = self.economy.referral_bonus(bundle.cost);
        let outcome = self
            .ledger
            .record_purchase(user, bundle, bonus, self.clock.utc())
            .await
            .map_err(map_store_error)?;
        if let PurchaseOutcome::Recorded {
            balance,
            referral_bonus,
            ..
        } = &outcome
        {
            info!(
                user_id = %user,
                amount = bundle.amount,
                cost = bundle.cost,
                balance,
                referral_bonus = referral_bonus.map(|bonus| bonus.amount),
                "purchase recorded"
            );
        }
        Ok(outcome)
    }
}
