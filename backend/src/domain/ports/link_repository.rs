//! Port for link creation, inspection, and deletion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    CompletionPolicy, Link, LinkDetails, LinkId, LinkUrl, Performer, Platform, RequirementDraft,
    UserId,
};

use super::LedgerStoreError;

/// A link about to be created together with its priced requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub owner: UserId,
    pub url: LinkUrl,
    pub platform: Platform,
    pub requirements: Vec<RequirementDraft>,
    pub created_at: DateTime<Utc>,
}

/// Result of creating a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddLinkOutcome {
    Created { details: LinkDetails, balance: i64 },
    InsufficientFunds { balance: i64, required: i64 },
}

/// Result of deleting a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteLinkOutcome {
    Deleted { refund: i64, balance: i64 },
    NotFound,
    NotOwner,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Spend the total price from the owner and insert the link with its
    /// requirement rows in one transaction.
    async fn create_link(&self, link: NewLink) -> Result<AddLinkOutcome, LedgerStoreError>;

    async fn find_link(&self, id: LinkId) -> Result<Option<LinkDetails>, LedgerStoreError>;

    /// Links owned by `owner`, newest first.
    async fn links_by_owner(&self, owner: UserId) -> Result<Vec<LinkDetails>, LedgerStoreError>;

    /// Recorded completions on a link, oldest first.
    async fn performers(&self, id: LinkId) -> Result<Vec<Performer>, LedgerStoreError>;

    /// Mark an active link completed if it is served and has no pending
    /// complaint. Returns the link when this call made the transition.
    async fn complete_if_served(
        &self,
        id: LinkId,
        policy: CompletionPolicy,
    ) -> Result<Option<Link>, LedgerStoreError>;

    /// Remove the link, its complaints, completions, and requirements, then
    /// credit the owner the refund, all atomically. `refund_percent` is the
    /// share of unserved credit returned.
    async fn delete_link(
        &self,
        owner: UserId,
        id: LinkId,
        refund_percent: i64,
    ) -> Result<DeleteLinkOutcome, LedgerStoreError>;
}
