//! Engine settings loaded via OrthoConfig.
//!
//! Values come from `RECIPROCITY_*` environment variables, configuration
//! files, and command-line flags in the usual OrthoConfig precedence.

use std::env;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::ExternalUserId;

/// Variable consulted when `RECIPROCITY_DATABASE_URL` is absent.
pub const DATABASE_URL_FALLBACK: &str = "DATABASE_URL";

/// Runtime settings for the engine and its administrative tooling.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "RECIPROCITY")]
pub struct EngineSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Front-end account that bypasses the access gate and receives
    /// complaint and unban-request notices.
    pub super_admin_external_id: Option<i64>,
    /// Pause between two broadcast deliveries, in milliseconds.
    #[ortho_config(default = 50)]
    pub broadcast_delay_ms: u64,
    /// Upper bound on pooled database connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
}

impl EngineSettings {
    /// Configured database URL, falling back to `DATABASE_URL`.
    ///
    /// Blank values count as missing.
    pub fn database_url(&self) -> Option<String> {
        self.database_url
            .clone()
            .or_else(|| env::var(DATABASE_URL_FALLBACK).ok())
            .filter(|url| !url.trim().is_empty())
    }

    pub fn super_admin(&self) -> Option<ExternalUserId> {
        self.super_admin_external_id.map(ExternalUserId::new)
    }

    pub const fn broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.broadcast_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for engine settings parsing.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    fn load_from_empty_args() -> EngineSettings {
        EngineSettings::load_from_iter([OsString::from("reciprocity-admin")])
            .expect("config should load")
    }

    #[rstest]
    fn defaults_apply_when_unset() {
        let _guard = lock_env([
            ("RECIPROCITY_DATABASE_URL", None::<String>),
            ("RECIPROCITY_SUPER_ADMIN_EXTERNAL_ID", None::<String>),
            ("RECIPROCITY_BROADCAST_DELAY_MS", None::<String>),
            ("RECIPROCITY_POOL_MAX_SIZE", None::<String>),
            ("DATABASE_URL", None::<String>),
        ]);

        let settings = load_from_empty_args();
        assert!(settings.database_url().is_none());
        assert!(settings.super_admin().is_none());
        assert_eq!(settings.broadcast_delay(), Duration::from_millis(50));
        assert_eq!(settings.pool_max_size, 10);
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env([
            (
                "RECIPROCITY_DATABASE_URL",
                Some("postgres://engine@localhost/ledger".to_owned()),
            ),
            ("RECIPROCITY_SUPER_ADMIN_EXTERNAL_ID", Some("4242".to_owned())),
            ("RECIPROCITY_BROADCAST_DELAY_MS", Some("0".to_owned())),
            ("RECIPROCITY_POOL_MAX_SIZE", Some("3".to_owned())),
            ("DATABASE_URL", Some("postgres://ignored".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.database_url().as_deref(),
            Some("postgres://engine@localhost/ledger")
        );
        assert_eq!(settings.super_admin(), Some(ExternalUserId::new(4242)));
        assert_eq!(settings.broadcast_delay(), Duration::ZERO);
        assert_eq!(settings.pool_max_size, 3);
    }

    #[rstest]
    fn database_url_falls_back_to_conventional_variable() {
        let _guard = lock_env([
            ("RECIPROCITY_DATABASE_URL", None::<String>),
            ("DATABASE_URL", Some("postgres://fallback/ledger".to_owned())),
        ]);

        let settings = load_from_empty_args();
        assert_eq!(
            settings.database_url().as_deref(),
            Some("postgres://fallback/ledger")
        );
    }
}
