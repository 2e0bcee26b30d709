//! Participant accounts, profile handles, and activity statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActionType, ExternalUserId, Platform, UserId};

/// Interface language assigned to new accounts.
pub const DEFAULT_LANGUAGE: &str = "ru";

/// Profile handles per platform. A platform with a handle is "connected".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformHandles(BTreeMap<Platform, String>);

impl PlatformHandles {
    /// Handle stored for `platform`.
    pub fn get(&self, platform: Platform) -> Option<&str> {
        self.0.get(&platform).map(String::as_str)
    }

    /// Store or clear the handle for `platform`. Blank handles clear.
    pub fn set(&mut self, platform: Platform, handle: Option<String>) {
        match handle.filter(|value| !value.trim().is_empty()) {
            Some(value) => {
                self.0.insert(platform, value);
            }
            None => {
                self.0.remove(&platform);
            }
        }
    }

    /// Platforms with a non-empty handle, in declaration order.
    pub fn connected(&self) -> Vec<Platform> {
        self.0.keys().copied().collect()
    }
}

/// A participant in the economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub external_id: ExternalUserId,
    pub username: Option<String>,
    pub credits: i64,
    pub warnings: u32,
    pub rating: i64,
    pub handles: PlatformHandles,
    pub referral_code: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Platforms the user can be offered work on.
    pub fn connected_platforms(&self) -> Vec<Platform> {
        self.handles.connected()
    }
}

/// Rating formula: five points per action performed, ten per link added,
/// one per action received.
pub const fn rating(actions_sent: i64, links_added: i64, actions_received: i64) -> i64 {
    actions_sent * 5 + links_added * 10 + actions_received
}

/// Activity counters shown on a user's profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub actions_sent: i64,
    pub actions_received: i64,
    pub links_added: i64,
    pub credits_purchased: i64,
    pub credits_spent: i64,
    pub sent_by_type: BTreeMap<ActionType, i64>,
    pub credits: i64,
    pub warnings: u32,
    pub rating: i64,
}

impl UserStats {
    /// Rating implied by the counters.
    pub const fn computed_rating(&self) -> i64 {
        rating(self.actions_sent, self.links_added, self.actions_received)
    }
}
