//! Shared test doubles for unit and integration tests.
//!
//! Compiled for `cfg(test)` and behind the `test-support` feature so the
//! integration suites in `tests/` can drive services with a controllable
//! clock and a recording sleeper.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::domain::ports::Sleeper;
use crate::domain::{
    DEFAULT_LANGUAGE, ExternalUserId, Platform, PlatformHandles, User, UserId,
};

/// Clock whose current instant is set and advanced by the test.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: TimeDelta) {
        *self.lock_clock() += delta;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.lock_clock() = now;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Sleeper that records requested pauses without waiting.
#[derive(Default)]
pub struct RecordingSleeper(Mutex<Vec<Duration>>);

impl RecordingSleeper {
    pub fn pauses(&self) -> Vec<Duration> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// Fixed instant used as "now" across test suites.
pub fn fixture_now() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).single() {
        Some(now) => now,
        None => panic!("fixture timestamp must be valid"),
    }
}

/// A user with a Behance handle and the given balance.
pub fn sample_user(id: i64, credits: i64) -> User {
    let mut handles = PlatformHandles::default();
    handles.set(Platform::Behance, Some(format!("artist{id}")));
    User {
        id: UserId::new(id),
        external_id: ExternalUserId::new(1000 + id),
        username: Some(format!("artist{id}")),
        credits,
        warnings: 0,
        rating: 0,
        handles,
        referral_code: None,
        language: DEFAULT_LANGUAGE.to_owned(),
        created_at: fixture_now(),
    }
}
