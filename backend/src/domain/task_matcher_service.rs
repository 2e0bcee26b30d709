//! Task matching and completion reporting.
//!
//! The matcher hands a user at most a small batch of links, each paired with
//! exactly one pending action. Completion reports are validated and applied
//! atomically by the store; this service only adds the owner notification
//! once the store has committed.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info, warn};

use super::ports::{
    CompletionRequest, Notifier, TaskOffer, TaskQuery, TaskRepository, UserRepository,
};
use super::service_support::{map_store_error, notify_best_effort};
use super::{
    ActionType, CompletionOutcome, CompletionReceipt, DomainResult, EconomyConfig, Error, LinkId,
    Notice, Platform, UserId,
};

/// Result of asking for work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Eligible links, most recent first, each with one pending action.
    Offers(Vec<TaskOffer>),
    /// The user has no connected platform and should connect one.
    NoPlatforms,
    /// Nothing is eligible right now.
    NoWork,
}

#[derive(Clone)]
pub struct TaskMatcherService<T, U, N> {
    tasks: Arc<T>,
    users: Arc<U>,
    notifier: Arc<N>,
    economy: Arc<EconomyConfig>,
    clock: Arc<dyn Clock>,
}

impl<T, U, N> TaskMatcherService<T, U, N> {
    pub fn new(
        tasks: Arc<T>,
        users: Arc<U>,
        notifier: Arc<N>,
        economy: Arc<EconomyConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks,
            users,
            notifier,
            economy,
            clock,
        }
    }
}

impl<T, U, N> TaskMatcherService<T, U, N>
where
    T: TaskRepository,
    U: UserRepository,
    N: Notifier,
{
    /// Offer at most one task to `user` on `platforms`.
    pub async fn match_task(
        &self,
        user: UserId,
        platforms: &[Platform],
    ) -> DomainResult<MatchOutcome> {
        self.match_tasks(user, platforms, 1).await
    }

    /// Offer up to `limit` tasks, capped by the configured batch size.
    pub async fn match_tasks(
        &self,
        user: UserId,
        platforms: &[Platform],
        limit: usize,
    ) -> DomainResult<MatchOutcome> {
        if platforms.is_empty() {
            return Ok(MatchOutcome::NoPlatforms);
        }
        let limit = limit.clamp(1, self.economy.match_batch_cap.max(1));
        let query = TaskQuery {
            user,
            platforms: platforms.to_vec(),
            cooldown_since: self.clock.utc() - self.economy.cooldown(),
            limit,
        };
        let offers = self
            .tasks
            .eligible_tasks(query)
            .await
            .map_err(map_store_error)?;
        debug!(%user, offers = offers.len(), "matched tasks");
        if offers.is_empty() {
            Ok(MatchOutcome::NoWork)
        } else {
            Ok(MatchOutcome::Offers(offers))
        }
    }

    /// Offer tasks on whichever platforms the stored account has connected.
    pub async fn match_for_user(&self, user: UserId, limit: usize) -> DomainResult<MatchOutcome> {
        let account = self
            .users
            .find_by_id(user)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("user {user} not found")))?;
        self.match_tasks(user, &account.connected_platforms(), limit)
            .await
    }

    /// Record a self-reported completion and pay for it.
    pub async fn record_completion(
        &self,
        user: UserId,
        link: LinkId,
        action_type: ActionType,
    ) -> DomainResult<CompletionOutcome> {
        let now = self.clock.utc();
        let request = CompletionRequest {
            user,
            link,
            action_type,
            now,
            cooldown_since: now - self.economy.cooldown(),
            policy: self.economy.completion_policy,
            referral_percent: self.economy.referral_percent,
        };
        let outcome = self
            .tasks
            .record_completion(request)
            .await
            .map_err(map_store_error)?;

        match &outcome {
            CompletionOutcome::Credited(receipt) => {
                info!(
                    user_id = %user,
                    link_id = %link,
                    action = %action_type,
                    amount = receipt.credited,
                    completed = receipt.progress.completed,
                    required = receipt.progress.required,
                    "completion credited"
                );
                if receipt.link_completed {
                    self.notify_owner(receipt).await;
                }
            }
            rejected => {
                debug!(
                    user_id = %user,
                    link_id = %link,
                    action = %action_type,
                    ?rejected,
                    "completion rejected"
                );
            }
        }
        Ok(outcome)
    }

    async fn notify_owner(&self, receipt: &CompletionReceipt) {
        let owner = match self.users.find_by_id(receipt.owner_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return,
            Err(error) => {
                warn!(owner_id = %receipt.owner_id, %error, "owner lookup failed");
                return;
            }
        };
        let notice = Notice::LinkCompleted {
            link_id: receipt.link_id,
            url: receipt.link_url.clone(),
        };
        notify_best_effort(self.notifier.as_ref(), owner.external_id, &notice).await;
    }
}

#[cfg(test)]
#[path = "task_matcher_service_tests.rs"]
mod tests;
