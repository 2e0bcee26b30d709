//! In-process ledger store with the same semantics as the PostgreSQL adapter.
//!
//! Every port method takes the single state lock once, performs all checks,
//! and only then mutates, so each call is atomic and policy rejections leave
//! no trace. Used by unit and integration tests and by tooling that needs a
//! throwaway ledger.

mod ledger;
mod moderation;
mod referrals;
mod users;

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::domain::ports::LedgerStoreError;
use crate::domain::{
    ActionRequirement, ActionType, Ban, BonusCause, Complaint, ComplaintId, ComplaintStatus,
    CompletionOutcome, CompletionPolicy, Link, LinkDetails, LinkId, LinkStatus, LinkUrl, Purchase,
    ReferralBonus, RequirementId, TransactionId, UnbanRequest, UnbanRequestId, User, UserId,
    rating, should_complete,
};

#[derive(Debug, Clone)]
struct RequirementRow {
    id: RequirementId,
    link_id: LinkId,
    action_type: ActionType,
    target: i64,
    unit_cost: i64,
}

#[derive(Debug, Clone)]
struct TransactionRow {
    id: TransactionId,
    user_id: UserId,
    link_id: LinkId,
    link_url: LinkUrl,
    action_type: ActionType,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct ReferralRow {
    referrer_id: UserId,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Sequences {
    user: i64,
    link: i64,
    requirement: i64,
    transaction: i64,
    complaint: i64,
    ban: i64,
    unban_request: i64,
}

#[derive(Debug, Default)]
struct State {
    seq: Sequences,
    users: BTreeMap<UserId, User>,
    links: BTreeMap<LinkId, Link>,
    requirements: BTreeMap<RequirementId, RequirementRow>,
    transactions: BTreeMap<TransactionId, TransactionRow>,
    completed_urls: HashSet<(UserId, LinkUrl, ActionType)>,
    complaints: BTreeMap<ComplaintId, Complaint>,
    bans: Vec<Ban>,
    unban_requests: BTreeMap<UnbanRequestId, UnbanRequest>,
    referrals: BTreeMap<UserId, ReferralRow>,
    bonuses: Vec<ReferralBonus>,
    purchases: Vec<Purchase>,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

fn missing_user(id: UserId) -> LedgerStoreError {
    LedgerStoreError::integrity(format!("user {id} not found"))
}

impl State {
    fn user_mut(&mut self, id: UserId) -> Result<&mut User, LedgerStoreError> {
        self.users.get_mut(&id).ok_or_else(|| missing_user(id))
    }

    fn credit(&mut self, id: UserId, amount: i64) -> Result<i64, LedgerStoreError> {
        let user = self.user_mut(id)?;
        user.credits += amount;
        Ok(user.credits)
    }

    fn requirements_of(&self, link: LinkId) -> Vec<ActionRequirement> {
        self.requirements
            .values()
            .filter(|row| row.link_id == link)
            .map(|row| ActionRequirement {
                id: row.id,
                link_id: row.link_id,
                action_type: row.action_type,
                target: row.target,
                unit_cost: row.unit_cost,
                completed: self.completed_count(link, row.action_type),
            })
            .collect()
    }

    fn completed_count(&self, link: LinkId, action_type: ActionType) -> i64 {
        let count = self
            .transactions
            .values()
            .filter(|tx| tx.link_id == link && tx.action_type == action_type)
            .count();
        i64::try_from(count).unwrap_or(i64::MAX)
    }

    fn has_pending_complaint(&self, link: LinkId) -> bool {
        self.complaints
            .values()
            .any(|c| c.link_id == link && c.status == ComplaintStatus::Pending)
    }

    fn active_ban(&self, user: UserId, now: DateTime<Utc>) -> Option<&Ban> {
        self.bans
            .iter()
            .filter(|ban| ban.user_id == user && ban.is_active(now))
            .max_by_key(|ban| (ban.created_at, ban.id))
    }

    fn refresh_rating(&mut self, id: UserId) {
        let sent = self.transactions.values().filter(|tx| tx.user_id == id).count();
        let owned: HashSet<LinkId> = self
            .links
            .values()
            .filter(|link| link.owner_id == id)
            .map(|link| link.id)
            .collect();
        let received = self
            .transactions
            .values()
            .filter(|tx| owned.contains(&tx.link_id))
            .count();
        let as_i64 = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
        if let Some(user) = self.users.get_mut(&id) {
            user.rating = rating(as_i64(sent), as_i64(owned.len()), as_i64(received));
        }
    }

    /// The reason `user` may not earn `action_type` on `link`, if any.
    fn earn_block(
        &self,
        user: UserId,
        link: &Link,
        action_type: ActionType,
        cooldown_since: DateTime<Utc>,
    ) -> Option<CompletionOutcome> {
        let earned = |tx: &&TransactionRow| tx.user_id == user && tx.action_type == action_type;
        if self
            .transactions
            .values()
            .filter(earned)
            .any(|tx| tx.link_id == link.id)
        {
            return Some(CompletionOutcome::AlreadyDone);
        }
        let recent = self
            .transactions
            .values()
            .filter(earned)
            .any(|tx| tx.link_url == link.url && tx.created_at >= cooldown_since);
        let permanent = self
            .completed_urls
            .contains(&(user, link.url.clone(), action_type));
        if recent || permanent {
            return Some(CompletionOutcome::CooldownActive);
        }
        None
    }

    fn details(&self, link: &Link) -> LinkDetails {
        LinkDetails {
            link: link.clone(),
            requirements: self.requirements_of(link.id),
        }
    }

    /// Pay the referrer of `referred`, if any, and log the bonus.
    fn pay_referrer(
        &mut self,
        referred: UserId,
        amount: i64,
        cause: BonusCause,
    ) -> Result<Option<ReferralBonus>, LedgerStoreError> {
        if amount <= 0 {
            return Ok(None);
        }
        let Some(row) = self.referrals.get(&referred).copied() else {
            return Ok(None);
        };
        self.credit(row.referrer_id, amount)?;
        let bonus = ReferralBonus {
            referrer_id: row.referrer_id,
            referred_id: referred,
            amount,
            cause,
        };
        self.bonuses.push(bonus);
        Ok(Some(bonus))
    }

    /// Complete the link when it is active, served, and unblocked.
    fn try_complete(&mut self, id: LinkId, policy: CompletionPolicy) -> Option<Link> {
        let status = self.links.get(&id)?.status;
        if status != LinkStatus::Active {
            return None;
        }
        let requirements = self.requirements_of(id);
        if !should_complete(policy, &requirements, self.has_pending_complaint(id)) {
            return None;
        }
        let link = self.links.get_mut(&id)?;
        link.status = LinkStatus::Completed;
        Some(link.clone())
    }
}

/// Ledger store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: Mutex<State>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed account, keeping the id sequence ahead of it.
    pub fn seed_user(&self, user: User) -> Result<(), LedgerStoreError> {
        let mut state = self.lock()?;
        state.seq.user = state.seq.user.max(user.id.get());
        state.users.insert(user.id, user);
        Ok(())
    }

    /// Record an earlier completion with no Completed-URL Record behind it,
    /// as history kept from before that table existed. Only the 30-day
    /// cooldown then guards the URL.
    pub fn seed_transaction(
        &self,
        user: UserId,
        link: LinkId,
        action_type: ActionType,
        created_at: DateTime<Utc>,
    ) -> Result<TransactionId, LedgerStoreError> {
        let mut state = self.lock()?;
        let link_url = state
            .links
            .get(&link)
            .map(|row| row.url.clone())
            .ok_or_else(|| LedgerStoreError::integrity(format!("link {link} not found")))?;
        let id = TransactionId::new(next(&mut state.seq.transaction));
        state.transactions.insert(
            id,
            TransactionRow {
                id,
                user_id: user,
                link_id: link,
                link_url,
                action_type,
                created_at,
            },
        );
        Ok(id)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, LedgerStoreError> {
        self.state
            .lock()
            .map_err(|_| LedgerStoreError::query("memory store lock poisoned"))
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
