//! Submitted links, their action requirements, and completion arithmetic.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    ActionType, Cart, CompletionPolicy, EconomyConfig, ExternalUserId, LinkId, LinkUrl, Platform,
    RequirementId, TransactionId, UserId, share_rounded,
};

/// Lifecycle status of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Completed,
}

impl LinkStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// Error returned when parsing an unknown link status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown link status: {0}")]
pub struct UnknownLinkStatus(pub String);

impl FromStr for LinkStatus {
    type Err = UnknownLinkStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(UnknownLinkStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A portfolio link ("project") awaiting reciprocal actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: LinkId,
    pub owner_id: UserId,
    pub url: LinkUrl,
    pub platform: Platform,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
}

/// Target and progress for one action type on one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequirement {
    pub id: RequirementId,
    pub link_id: LinkId,
    pub action_type: ActionType,
    pub target: i64,
    pub unit_cost: i64,
    pub completed: i64,
}

impl ActionRequirement {
    /// Units still awaiting completion, never negative.
    pub const fn outstanding(&self) -> i64 {
        let remaining = self.target - self.completed;
        if remaining > 0 { remaining } else { 0 }
    }
}

/// Requirement row about to be created for a new link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequirementDraft {
    pub action_type: ActionType,
    pub target: i64,
    pub unit_cost: i64,
}

/// Expand a cart into requirement drafts priced from `config`.
pub fn price_cart(cart: &Cart, config: &EconomyConfig) -> Vec<RequirementDraft> {
    cart.lines()
        .map(|(action_type, units)| RequirementDraft {
            action_type,
            target: i64::from(units),
            unit_cost: config.unit_cost(action_type),
        })
        .collect()
}

/// Total credit price of a set of drafts.
pub fn drafts_total(drafts: &[RequirementDraft]) -> i64 {
    drafts.iter().map(|draft| draft.target * draft.unit_cost).sum()
}

/// Aggregate progress of a link: (completed, required).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkProgress {
    pub completed: i64,
    pub required: i64,
}

impl LinkProgress {
    /// Sum progress across every requirement row.
    pub fn of(requirements: &[ActionRequirement]) -> Self {
        requirements
            .iter()
            .fold(Self::default(), |acc, requirement| Self {
                completed: acc.completed + requirement.completed,
                required: acc.required + requirement.target,
            })
    }
}

/// Whether `requirements` satisfy `policy`. A link with nothing required is
/// never served.
pub fn is_served(policy: CompletionPolicy, requirements: &[ActionRequirement]) -> bool {
    let progress = LinkProgress::of(requirements);
    if progress.required <= 0 {
        return false;
    }
    match policy {
        CompletionPolicy::Aggregate => progress.completed >= progress.required,
        CompletionPolicy::PerType => requirements.iter().all(|row| row.outstanding() == 0),
    }
}

/// Whether a still-active link should transition to completed now.
pub fn should_complete(
    policy: CompletionPolicy,
    requirements: &[ActionRequirement],
    has_pending_complaint: bool,
) -> bool {
    !has_pending_complaint && is_served(policy, requirements)
}

/// Credits returned to the owner when the link is deleted: `refund_percent`
/// of each row's unserved credit, rounded per row, summed.
pub fn refund(requirements: &[ActionRequirement], refund_percent: i64) -> i64 {
    requirements
        .iter()
        .map(|row| share_rounded(row.outstanding() * row.unit_cost, refund_percent))
        .sum()
}

/// The lowest-id requirement with outstanding units.
pub fn next_pending(requirements: &[ActionRequirement]) -> Option<&ActionRequirement> {
    requirements
        .iter()
        .filter(|row| row.outstanding() > 0)
        .min_by_key(|row| row.id)
}

/// A link together with its requirement rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDetails {
    pub link: Link,
    pub requirements: Vec<ActionRequirement>,
}

impl LinkDetails {
    pub fn progress(&self) -> LinkProgress {
        LinkProgress::of(&self.requirements)
    }
}

/// One recorded completion on a link, shown to the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performer {
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    pub external_id: ExternalUserId,
    pub username: Option<String>,
    pub action_type: ActionType,
    pub performed_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
