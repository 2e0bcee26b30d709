//! Port for participant accounts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ExternalUserId, Platform, User, UserId, UserStats};

use super::LedgerStoreError;

/// Data needed to create an account on first contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub external_id: ExternalUserId,
    pub username: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

/// Result of trying to store a freshly generated referral code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeAssignment {
    /// The code was stored.
    Assigned(String),
    /// The user already had a code, which is returned unchanged.
    AlreadySet(String),
    /// Another user holds the code; retry with a new one.
    Collision,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, LedgerStoreError>;

    async fn find_by_external_id(
        &self,
        external_id: ExternalUserId,
    ) -> Result<Option<User>, LedgerStoreError>;

    /// Return the account for `new_user.external_id`, creating it if absent.
    /// The flag is `true` when the account was created by this call. An
    /// existing account has its username refreshed.
    async fn get_or_create(&self, new_user: NewUser) -> Result<(User, bool), LedgerStoreError>;

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, LedgerStoreError>;

    /// Store `code` unless the user already has one.
    async fn assign_referral_code(
        &self,
        id: UserId,
        code: &str,
    ) -> Result<CodeAssignment, LedgerStoreError>;

    /// Accounts without a referral code, oldest first.
    async fn users_without_referral_code(&self) -> Result<Vec<UserId>, LedgerStoreError>;

    /// Store or clear a platform handle. Returns `None` for unknown users.
    async fn set_handle(
        &self,
        id: UserId,
        platform: Platform,
        handle: Option<String>,
    ) -> Result<Option<User>, LedgerStoreError>;

    /// Returns `None` for unknown users.
    async fn set_language(
        &self,
        id: UserId,
        language: &str,
    ) -> Result<Option<User>, LedgerStoreError>;

    /// Activity counters. Returns `None` for unknown users.
    async fn stats(&self, id: UserId) -> Result<Option<UserStats>, LedgerStoreError>;

    /// Every account not banned at `now`, excluding `except`.
    async fn reachable_users(
        &self,
        now: DateTime<Utc>,
        except: Option<UserId>,
    ) -> Result<Vec<ExternalUserId>, LedgerStoreError>;
}
