//! Port for complaints, bans, and unban requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Ban, BanDraft, Complaint, ComplaintDraft, ComplaintId, Strike, UnbanDecision, UnbanRequest,
    UnbanRequestId, UserId, Verdict,
};

use super::LedgerStoreError;

/// Result of filing a complaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileComplaintOutcome {
    /// The complaint was stored and the accused's completions removed.
    Filed {
        complaint: Complaint,
        removed_transactions: u64,
    },
    LinkNotFound,
    /// Only the link owner may complain about it.
    NotOwner,
    /// The accused has no matching completion on the link.
    NoSuchPerformance,
}

/// Parameters of an administrator's complaint decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplaintDecision {
    pub complaint: ComplaintId,
    pub admin: UserId,
    pub verdict: Verdict,
    pub note: Option<String>,
    pub now: DateTime<Utc>,
    /// Confirmed violations that turn into a ban.
    pub strike_threshold: u32,
}

/// Result of deciding a complaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecideComplaintOutcome {
    Decided {
        complaint: Complaint,
        /// Present for [`Verdict::Violation`].
        strike: Option<Strike>,
        /// Present when the decision banned the accused.
        ban: Option<Ban>,
        accused_warnings: u32,
    },
    NotFound,
    AlreadyDecided(Complaint),
}

/// Result of filing an unban request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnbanRequestOutcome {
    Created(UnbanRequest),
    /// The user filed a request inside the rate-limit window.
    TooSoon { last: UnbanRequest },
    NotBanned,
}

/// Result of deciding an unban request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecideUnbanOutcome {
    Decided { request: UnbanRequest, lifted: u64 },
    NotFound,
    AlreadyDecided(UnbanRequest),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModerationRepository: Send + Sync {
    /// Store a complaint and delete the accused's matching completions on
    /// the link in one transaction. Paid credit and completed-URL records
    /// are left untouched.
    async fn file_complaint(
        &self,
        draft: ComplaintDraft,
        now: DateTime<Utc>,
    ) -> Result<FileComplaintOutcome, LedgerStoreError>;

    async fn find_complaint(&self, id: ComplaintId)
    -> Result<Option<Complaint>, LedgerStoreError>;

    /// Pending complaints, newest first.
    async fn pending_complaints(&self) -> Result<Vec<Complaint>, LedgerStoreError>;

    /// Apply a verdict: update the complaint, the accused's warnings, and
    /// insert a ban when the verdict calls for one, atomically.
    async fn decide_complaint(
        &self,
        decision: ComplaintDecision,
    ) -> Result<DecideComplaintOutcome, LedgerStoreError>;

    /// Insert a ban row. Unknown users raise [`LedgerStoreError::Integrity`].
    async fn issue_ban(&self, draft: BanDraft, now: DateTime<Utc>)
    -> Result<Ban, LedgerStoreError>;

    /// Stamp every ban active at `now` as lifted. Returns how many rows were
    /// lifted.
    async fn lift_bans(
        &self,
        user: UserId,
        lifted_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<u64, LedgerStoreError>;

    /// The most recently issued ban active at `now`.
    async fn active_ban(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Ban>, LedgerStoreError>;

    /// Every ban ever issued to the user, newest first.
    async fn ban_history(&self, user: UserId) -> Result<Vec<Ban>, LedgerStoreError>;

    /// File an unban request unless the user is not banned or already filed
    /// one at or after `window_start`.
    async fn create_unban_request(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<UnbanRequestOutcome, LedgerStoreError>;

    async fn find_unban_request(
        &self,
        id: UnbanRequestId,
    ) -> Result<Option<UnbanRequest>, LedgerStoreError>;

    /// Record the decision; approval lifts the user's active bans in the
    /// same transaction.
    async fn decide_unban_request(
        &self,
        id: UnbanRequestId,
        admin: UserId,
        decision: UnbanDecision,
        now: DateTime<Utc>,
    ) -> Result<DecideUnbanOutcome, LedgerStoreError>;
}
