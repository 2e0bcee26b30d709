//! Credit ledger records and policy outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActionType, LinkId, LinkProgress, LinkUrl, ReferralBonus, TransactionId, UserId};

/// A recorded credit top-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub user_id: UserId,
    pub amount: i64,
    pub cost: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of a balance decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SpendOutcome {
    Spent { balance: i64 },
    InsufficientFunds { balance: i64, required: i64 },
}

/// Result of recording a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Recorded {
        purchase: Purchase,
        balance: i64,
        referral_bonus: Option<ReferralBonus>,
    },
    /// The amount is not one of the configured bundles.
    UnknownBundle { amount: i64 },
}

/// A completion accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReceipt {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub link_id: LinkId,
    pub action_type: ActionType,
    pub credited: i64,
    pub balance: i64,
    pub progress: LinkProgress,
    /// The link transitioned to completed as part of this call.
    pub link_completed: bool,
    pub owner_id: UserId,
    pub link_url: LinkUrl,
    pub referral_bonus: Option<ReferralBonus>,
}

/// Result of reporting a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Credited(CompletionReceipt),
    /// The user already earned this action on this link.
    AlreadyDone,
    /// The user earned this action on the same URL recently or permanently.
    CooldownActive,
    /// Users cannot act on their own links.
    SelfActionForbidden,
    /// The link has no outstanding units of this action, or is gone.
    NotEligible,
}
