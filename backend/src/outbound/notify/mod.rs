//! Notice delivery and pacing adapters.
//!
//! The messaging transport lives outside this crate. [`TracingNotifier`]
//! emits each notice as a structured log event so an operator or a log
//! shipper can relay it, and [`TokioSleeper`] paces broadcasts on the tokio
//! timer.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::{DeliveryError, Notifier, Sleeper};
use crate::domain::{ExternalUserId, Notice};

/// Notifier that logs every notice as JSON at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn deliver(
        &self,
        recipient: ExternalUserId,
        notice: &Notice,
    ) -> Result<(), DeliveryError> {
        let payload = serde_json::to_string(notice)
            .map_err(|err| DeliveryError::transport(err.to_string()))?;
        info!(%recipient, %payload, text = %notice.text(), "notice");
        Ok(())
    }
}

/// Sleeper backed by `tokio::time::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
