//! Business constants shared by every ledger component.
//!
//! Prices, percentages, thresholds, and windows live in one
//! [`EconomyConfig`] value that services receive as `Arc<EconomyConfig>`.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use super::ActionType;

/// How a link decides that it has been fully served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Total completed actions across all types reach the total required.
    #[default]
    Aggregate,
    /// Every requirement row has reached its own target.
    PerType,
}

/// Credit price per unit of each action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitCosts {
    pub view: i64,
    pub like: i64,
    pub comment: i64,
    pub follow: i64,
}

impl Default for UnitCosts {
    fn default() -> Self {
        Self {
            view: 1,
            like: 5,
            comment: 10,
            follow: 30,
        }
    }
}

impl UnitCosts {
    /// Credit price of one unit of `action`.
    pub const fn of(&self, action: ActionType) -> i64 {
        match action {
            ActionType::View => self.view,
            ActionType::Like => self.like,
            ActionType::Comment => self.comment,
            ActionType::Follow => self.follow,
        }
    }
}

/// A purchasable credit top-up and its monetary cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseBundle {
    /// Credits granted.
    pub amount: i64,
    /// Price charged by the external payment rail.
    pub cost: i64,
}

fn default_bundles() -> Vec<PurchaseBundle> {
    [(100, 100), (500, 450), (1000, 850)]
        .into_iter()
        .map(|(amount, cost)| PurchaseBundle { amount, cost })
        .collect()
}

/// `percent` of `value`, rounded down. Non-positive values yield zero.
pub const fn share_floor(value: i64, percent: i64) -> i64 {
    if value <= 0 || percent <= 0 {
        return 0;
    }
    value * percent / 100
}

/// `percent` of `value`, rounded half up. Non-positive values yield zero.
pub const fn share_rounded(value: i64, percent: i64) -> i64 {
    if value <= 0 || percent <= 0 {
        return 0;
    }
    (value * percent + 50) / 100
}

/// Every tunable constant of the economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub unit_costs: UnitCosts,
    pub purchase_bundles: Vec<PurchaseBundle>,
    /// Share of an earning or purchase event paid to the referrer.
    pub referral_percent: i64,
    /// Flat bonus paid once to a referrer when the referred user registers.
    pub registration_bonus: i64,
    /// Share of unserved credit returned when a link is deleted.
    pub refund_percent: i64,
    /// Confirmed violations that turn into a ban.
    pub strike_threshold: u32,
    pub cooldown_days: i64,
    pub match_batch_cap: usize,
    pub unban_request_window_hours: i64,
    pub completion_policy: CompletionPolicy,
    pub referral_code_length: usize,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            unit_costs: UnitCosts::default(),
            purchase_bundles: default_bundles(),
            referral_percent: 20,
            registration_bonus: 50,
            refund_percent: 80,
            strike_threshold: 3,
            cooldown_days: 30,
            match_batch_cap: 5,
            unban_request_window_hours: 24,
            completion_policy: CompletionPolicy::Aggregate,
            referral_code_length: 8,
        }
    }
}

impl EconomyConfig {
    /// Credit price of one unit of `action`.
    pub const fn unit_cost(&self, action: ActionType) -> i64 {
        self.unit_costs.of(action)
    }

    /// Look up the bundle granting exactly `amount` credits.
    pub fn bundle_for(&self, amount: i64) -> Option<PurchaseBundle> {
        self.purchase_bundles
            .iter()
            .copied()
            .find(|bundle| bundle.amount == amount)
    }

    /// Referrer share of an event worth `event_value`, rounded down.
    pub const fn referral_bonus(&self, event_value: i64) -> i64 {
        share_floor(event_value, self.referral_percent)
    }

    /// Refund for `unserved` units priced at `unit_cost`, rounded half-up.
    pub const fn refund_for(&self, unserved: i64, unit_cost: i64) -> i64 {
        if unserved <= 0 || unit_cost <= 0 {
            return 0;
        }
        share_rounded(unserved * unit_cost, self.refund_percent)
    }

    /// Re-earn prohibition window for the same URL and action type.
    pub const fn cooldown(&self) -> TimeDelta {
        TimeDelta::days(self.cooldown_days)
    }

    /// Minimum spacing between two unban requests from one user.
    pub const fn unban_request_window(&self) -> TimeDelta {
        TimeDelta::hours(self.unban_request_window_hours)
    }
}
