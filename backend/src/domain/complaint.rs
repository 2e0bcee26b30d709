//! Complaints and the strike escalation that turns them into bans.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActionType, ComplaintId, LinkId, UserId};

/// Resolution state of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    Resolved,
    Rejected,
}

impl ComplaintStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }
}

/// Error returned when parsing an unknown complaint status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown complaint status: {0}")]
pub struct UnknownComplaintStatus(pub String);

impl FromStr for ComplaintStatus {
    type Err = UnknownComplaintStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "rejected" => Ok(Self::Rejected),
            other => Err(UnknownComplaintStatus(other.to_owned())),
        }
    }
}

/// An owner's accusation that a performer did not genuinely act.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: ComplaintId,
    pub complainant_id: UserId,
    pub accused_id: UserId,
    pub link_id: LinkId,
    pub category: String,
    pub status: ComplaintStatus,
    pub resolved_by: Option<UserId>,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Input for filing a complaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplaintDraft {
    pub complainant_id: UserId,
    pub accused_id: UserId,
    pub link_id: LinkId,
    pub category: String,
    /// Restrict the removed completions to one action type.
    pub action_type: Option<ActionType>,
}

/// Administrator decision on a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The complaint is unfounded.
    NonViolation,
    /// Confirmed; counts as one strike.
    Violation,
    /// Confirmed and severe; bans without touching the strike counter.
    Ban,
}

/// Error returned when parsing an unknown verdict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown verdict: {0} (expected violation, nonviolation, or ban)")]
pub struct UnknownVerdict(pub String);

impl FromStr for Verdict {
    type Err = UnknownVerdict;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "nonviolation" | "non_violation" => Ok(Self::NonViolation),
            "violation" => Ok(Self::Violation),
            "ban" => Ok(Self::Ban),
            other => Err(UnknownVerdict(other.to_owned())),
        }
    }
}

/// Standing of a user in the strike machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "warnings")]
pub enum AbuseState {
    Clean,
    Warned(u32),
    Banned,
}

impl AbuseState {
    /// Derive the state from stored warnings and the ban check.
    pub const fn of(warnings: u32, banned: bool) -> Self {
        match (banned, warnings) {
            (true, _) => Self::Banned,
            (false, 0) => Self::Clean,
            (false, count) => Self::Warned(count),
        }
    }
}

/// Effect of one confirmed violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strike {
    /// Warn the user; `remaining` strikes are left before a ban.
    Warning { warnings: u32, remaining: u32 },
    /// The threshold was reached; ban permanently.
    Ban { warnings: u32 },
}

impl Strike {
    /// Warning count after the strike.
    pub const fn warnings(self) -> u32 {
        match self {
            Self::Warning { warnings, .. } | Self::Ban { warnings } => warnings,
        }
    }
}

/// Apply one strike to a user currently holding `warnings`.
pub const fn apply_strike(warnings: u32, threshold: u32) -> Strike {
    let next = warnings.saturating_add(1);
    if next >= threshold {
        Strike::Ban { warnings: next }
    } else {
        Strike::Warning {
            warnings: next,
            remaining: threshold - next,
        }
    }
}

/// Outcome of resolving a complaint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub complaint: Complaint,
    pub verdict: Verdict,
    pub accused_state: AbuseState,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NonViolation => "nonviolation",
            Self::Violation => "violation",
            Self::Ban => "ban",
        })
    }
}
