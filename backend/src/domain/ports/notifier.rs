//! Port for best-effort delivery of notices to users.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::{ExternalUserId, Notice};

use super::define_port_error;

define_port_error! {
    /// Failure to deliver one notice to one recipient.
    pub enum DeliveryError {
        /// The recipient cannot be reached (blocked the bot, deleted account).
        Unreachable { message: String } => "recipient unreachable: {message}",
        /// The delivery channel failed.
        Transport { message: String } => "notice transport failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(
        &self,
        recipient: ExternalUserId,
        notice: &Notice,
    ) -> Result<(), DeliveryError>;
}

/// Notifier that accepts and discards every notice.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn deliver(
        &self,
        _recipient: ExternalUserId,
        _notice: &Notice,
    ) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Notifier that records every notice and fails for chosen recipients.
#[derive(Debug, Default)]
pub struct FixtureNotifier {
    sent: Mutex<Vec<(ExternalUserId, Notice)>>,
    unreachable: Vec<ExternalUserId>,
}

impl FixtureNotifier {
    /// Fail deliveries to `recipients` with [`DeliveryError::Unreachable`].
    pub fn failing_for(recipients: impl IntoIterator<Item = ExternalUserId>) -> Self {
        Self {
            sent: Mutex::default(),
            unreachable: recipients.into_iter().collect(),
        }
    }

    /// Notices delivered so far, in order.
    pub fn sent(&self) -> Vec<(ExternalUserId, Notice)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Notices delivered to `recipient`, in order.
    pub fn sent_to(&self, recipient: ExternalUserId) -> Vec<Notice> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == recipient)
            .map(|(_, notice)| notice)
            .collect()
    }
}

#[async_trait]
impl Notifier for FixtureNotifier {
    async fn deliver(
        &self,
        recipient: ExternalUserId,
        notice: &Notice,
    ) -> Result<(), DeliveryError> {
        if self.unreachable.contains(&recipient) {
            return Err(DeliveryError::unreachable(format!("user {recipient}")));
        }
        let mut sent = self
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        sent.push((recipient, notice.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_notifier_records_and_fails_selectively() {
        let notifier = FixtureNotifier::failing_for([ExternalUserId::new(2)]);
        let notice = Notice::Unbanned;

        notifier
            .deliver(ExternalUserId::new(1), &notice)
            .await
            .expect("reachable recipient");
        let err = notifier
            .deliver(ExternalUserId::new(2), &notice)
            .await
            .expect_err("unreachable recipient");

        assert!(matches!(err, DeliveryError::Unreachable { .. }));
        assert_eq!(notifier.sent_to(ExternalUserId::new(1)), vec![notice]);
        assert!(notifier.sent_to(ExternalUserId::new(2)).is_empty());
    }
}
