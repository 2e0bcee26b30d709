//! Port for matching users to work and recording their completions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    ActionRequirement, ActionType, CompletionOutcome, CompletionPolicy, Link, LinkId, Platform,
    UserId,
};

use super::LedgerStoreError;

/// Parameters of an eligibility query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub user: UserId,
    /// Only links on these platforms are considered. Must not be empty.
    pub platforms: Vec<Platform>,
    /// Completions at or after this instant on the same URL block re-earning.
    pub cooldown_since: DateTime<Utc>,
    pub limit: usize,
}

/// A link paired with the single action the user should perform next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOffer {
    pub link: Link,
    pub requirement: ActionRequirement,
}

/// Parameters of a completion report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRequest {
    pub user: UserId,
    pub link: LinkId,
    pub action_type: ActionType,
    pub now: DateTime<Utc>,
    pub cooldown_since: DateTime<Utc>,
    pub policy: CompletionPolicy,
    /// Share of the earned credits paid to the earner's referrer.
    pub referral_percent: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Eligible offers, most recently added link first, ties by link id.
    ///
    /// Each link appears at most once, paired with its lowest-id requirement
    /// row that still has outstanding units and that the user may earn.
    async fn eligible_tasks(&self, query: TaskQuery) -> Result<Vec<TaskOffer>, LedgerStoreError>;

    /// Atomically validate and record a completion.
    ///
    /// On success this inserts the transaction and the permanent
    /// completed-URL record, credits the earner, pays the referrer, refreshes
    /// ratings, and completes the link when it is now fully served. Policy
    /// rejections leave the store untouched.
    async fn record_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionOutcome, LedgerStoreError>;
}
