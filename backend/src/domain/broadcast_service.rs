//! Rate-limited bulk delivery of an administrator message.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ports::{Notifier, Sleeper, UserRepository};
use super::service_support::map_store_error;
use super::{DomainResult, Error, ExternalUserId, Notice, UserId};

/// One recipient the broadcast could not reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastFailure {
    pub recipient: ExternalUserId,
    pub error: String,
}

/// Delivery report of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSummary {
    pub total: usize,
    pub sent: usize,
    pub failures: Vec<BroadcastFailure>,
}

#[derive(Clone)]
pub struct BroadcastService<U, N, S> {
    users: Arc<U>,
    notifier: Arc<N>,
    sleeper: Arc<S>,
    clock: Arc<dyn Clock>,
    delay: Duration,
}

impl<U, N, S> BroadcastService<U, N, S> {
    pub fn new(
        users: Arc<U>,
        notifier: Arc<N>,
        sleeper: Arc<S>,
        clock: Arc<dyn Clock>,
        delay: Duration,
    ) -> Self {
        Self {
            users,
            notifier,
            sleeper,
            clock,
            delay,
        }
    }
}

impl<U, N, S> BroadcastService<U, N, S>
where
    U: UserRepository,
    N: Notifier,
    S: Sleeper,
{
    /// Send `text` to every account not currently banned, except `sender`.
    ///
    /// Individual failures are collected; they never stop the remaining
    /// deliveries.
    pub async fn broadcast(
        &self,
        sender: Option<UserId>,
        text: &str,
    ) -> DomainResult<BroadcastSummary> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::invalid_request("broadcast text must not be empty"));
        }
        let recipients = self
            .users
            .reachable_users(self.clock.utc(), sender)
            .await
            .map_err(map_store_error)?;
        let notice = Notice::Broadcast {
            text: text.to_owned(),
        };

        let mut summary = BroadcastSummary {
            total: recipients.len(),
            ..BroadcastSummary::default()
        };
        for (index, recipient) in recipients.into_iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                self.sleeper.sleep(self.delay).await;
            }
            match self.notifier.deliver(recipient, &notice).await {
                Ok(()) => summary.sent += 1,
                Err(error) => {
                    warn!(%recipient, %error, "broadcast delivery failed");
                    summary.failures.push(BroadcastFailure {
                        recipient,
                        error: error.to_string(),
                    });
                }
            }
        }
        info!(
            total = summary.total,
            sent = summary.sent,
            failed = summary.failures.len(),
            "broadcast finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{FixtureNotifier, MockUserRepository};
    use crate::test_support::{MutableClock, RecordingSleeper, fixture_now};

    fn recipients() -> Vec<ExternalUserId> {
        (1..=3).map(ExternalUserId::new).collect()
    }

    #[tokio::test]
    async fn failures_are_collected_and_sending_continues() {
        let mut users = MockUserRepository::new();
        users
            .expect_reachable_users()
            .withf(|now, except| *now == fixture_now() && *except == Some(UserId::new(9)))
            .return_once(|_, _| Ok(recipients()));
        let notifier = Arc::new(FixtureNotifier::failing_for([ExternalUserId::new(2)]));
        let sleeper = Arc::new(RecordingSleeper::default());
        let service = BroadcastService::new(
            Arc::new(users),
            Arc::clone(&notifier),
            Arc::clone(&sleeper),
            Arc::new(MutableClock::new(fixture_now())),
            Duration::from_millis(50),
        );

        let summary = service
            .broadcast(Some(UserId::new(9)), " hello ")
            .await
            .expect("broadcast runs");

        assert_eq!(summary.total, 3);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].recipient, ExternalUserId::new(2));
        assert_eq!(notifier.sent_to(ExternalUserId::new(3)).len(), 1);
        assert_eq!(sleeper.pauses(), vec![Duration::from_millis(50); 2]);
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let mut users = MockUserRepository::new();
        users.expect_reachable_users().times(0);
        let service = BroadcastService::new(
            Arc::new(users),
            Arc::new(FixtureNotifier::default()),
            Arc::new(RecordingSleeper::default()),
            Arc::new(MutableClock::new(fixture_now())),
            Duration::from_millis(50),
        );

        let err = service.broadcast(None, "   ").await.expect_err("blank text");
        assert_eq!(err.code(), crate::domain::ErrorCode::InvalidRequest);
    }
}
