//! Bans and unban requests.
//!
//! Ban rows are never deleted. Lifting a ban stamps `lifted_at` and
//! `lifted_by`, so the full history stays queryable while the "currently
//! banned" check only looks at unlifted, unexpired rows.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BanId, UnbanRequestId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ban {
    pub id: BanId,
    pub user_id: UserId,
    pub reason: String,
    /// `None` for a permanent ban.
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub lifted_at: Option<DateTime<Utc>>,
    pub lifted_by: Option<UserId>,
}

impl Ban {
    pub const fn is_permanent(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Whether the ban restricts the user at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.lifted_at.is_none() && self.expires_at.is_none_or(|expires| expires > now)
    }
}

/// Input for issuing a ban.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanDraft {
    pub user_id: UserId,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_by: Option<UserId>,
}

/// Decision state of an unban request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnbanRequestStatus {
    Pending,
    Approved,
    Declined,
}

impl UnbanRequestStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Declined => "declined",
        }
    }
}

/// Error returned when parsing an unknown unban request status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown unban request status: {0}")]
pub struct UnknownUnbanRequestStatus(pub String);

impl FromStr for UnbanRequestStatus {
    type Err = UnknownUnbanRequestStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "declined" => Ok(Self::Declined),
            other => Err(UnknownUnbanRequestStatus(other.to_owned())),
        }
    }
}

/// A banned user's plea to have their ban lifted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnbanRequest {
    pub id: UnbanRequestId,
    pub user_id: UserId,
    pub status: UnbanRequestStatus,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Administrator decision on an unban request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnbanDecision {
    Approve,
    Decline,
}

impl UnbanDecision {
    pub const fn status(self) -> UnbanRequestStatus {
        match self {
            Self::Approve => UnbanRequestStatus::Approved,
            Self::Decline => UnbanRequestStatus::Declined,
        }
    }
}
