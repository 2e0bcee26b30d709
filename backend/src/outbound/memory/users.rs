//! Account storage for the in-memory ledger.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{CodeAssignment, LedgerStoreError, NewUser, UserRepository};
use crate::domain::{ExternalUserId, LinkId, Platform, PlatformHandles, User, UserId, UserStats};

use super::{MemoryLedgerStore, next};

#[async_trait]
impl UserRepository for MemoryLedgerStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, LedgerStoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: ExternalUserId,
    ) -> Result<Option<User>, LedgerStoreError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|user| user.external_id == external_id)
            .cloned())
    }

    async fn get_or_create(&self, new_user: NewUser) -> Result<(User, bool), LedgerStoreError> {
        let mut state = self.lock()?;
        if let Some(existing) = state
            .users
            .values_mut()
            .find(|user| user.external_id == new_user.external_id)
        {
            if new_user.username.is_some() {
                existing.username = new_user.username;
            }
            return Ok((existing.clone(), false));
        }

        let id = UserId::new(next(&mut state.seq.user));
        let user = User {
            id,
            external_id: new_user.external_id,
            username: new_user.username,
            credits: 0,
            warnings: 0,
            rating: 0,
            handles: PlatformHandles::default(),
            referral_code: None,
            language: new_user.language,
            created_at: new_user.created_at,
        };
        state.users.insert(id, user.clone());
        Ok((user, true))
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, LedgerStoreError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|user| user.referral_code.as_deref() == Some(code))
            .cloned())
    }

    async fn assign_referral_code(
        &self,
        id: UserId,
        code: &str,
    ) -> Result<CodeAssignment, LedgerStoreError> {
        let mut state = self.lock()?;
        let taken = state
            .users
            .values()
            .any(|user| user.id != id && user.referral_code.as_deref() == Some(code));
        let user = state.user_mut(id)?;
        if let Some(existing) = &user.referral_code {
            return Ok(CodeAssignment::AlreadySet(existing.clone()));
        }
        if taken {
            return Ok(CodeAssignment::Collision);
        }
        user.referral_code = Some(code.to_owned());
        Ok(CodeAssignment::Assigned(code.to_owned()))
    }

    async fn users_without_referral_code(&self) -> Result<Vec<UserId>, LedgerStoreError> {
        let state = self.lock()?;
        let mut pending: Vec<&User> = state
            .users
            .values()
            .filter(|user| user.referral_code.is_none())
            .collect();
        pending.sort_by_key(|user| (user.created_at, user.id));
        Ok(pending.into_iter().map(|user| user.id).collect())
    }

    async fn set_handle(
        &self,
        id: UserId,
        platform: Platform,
        handle: Option<String>,
    ) -> Result<Option<User>, LedgerStoreError> {
        let mut state = self.lock()?;
        Ok(state.users.get_mut(&id).map(|user| {
            user.handles.set(platform, handle);
            user.clone()
        }))
    }

    async fn set_language(
        &self,
        id: UserId,
        language: &str,
    ) -> Result<Option<User>, LedgerStoreError> {
        let mut state = self.lock()?;
        Ok(state.users.get_mut(&id).map(|user| {
            language.clone_into(&mut user.language);
            user.clone()
        }))
    }

    async fn stats(&self, id: UserId) -> Result<Option<UserStats>, LedgerStoreError> {
        let state = self.lock()?;
        let Some(user) = state.users.get(&id) else {
            return Ok(None);
        };

        let mut stats = UserStats {
            credits: user.credits,
            warnings: user.warnings,
            rating: user.rating,
            ..UserStats::default()
        };
        for tx in state.transactions.values().filter(|tx| tx.user_id == id) {
            stats.actions_sent += 1;
            *stats.sent_by_type.entry(tx.action_type).or_insert(0) += 1;
        }
        let owned: HashSet<LinkId> = state
            .links
            .values()
            .filter(|link| link.owner_id == id)
            .map(|link| link.id)
            .collect();
        stats.links_added = i64::try_from(owned.len()).unwrap_or(i64::MAX);
        stats.actions_received = i64::try_from(
            state
                .transactions
                .values()
                .filter(|tx| owned.contains(&tx.link_id))
                .count(),
        )
        .unwrap_or(i64::MAX);
        stats.credits_spent = state
            .requirements
            .values()
            .filter(|row| owned.contains(&row.link_id))
            .map(|row| row.target * row.unit_cost)
            .sum();
        stats.credits_purchased = state
            .purchases
            .iter()
            .filter(|purchase| purchase.user_id == id)
            .map(|purchase| purchase.amount)
            .sum();
        Ok(Some(stats))
    }

    async fn reachable_users(
        &self,
        now: DateTime<Utc>,
        except: Option<UserId>,
    ) -> Result<Vec<ExternalUserId>, LedgerStoreError> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .filter(|user| Some(user.id) != except)
            .filter(|user| state.active_ban(user.id, now).is_none())
            .map(|user| user.external_id)
            .collect())
    }
}
