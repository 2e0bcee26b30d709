//! Administrative commands for the mutual-action economy engine.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use reciprocity::domain::{
    AccountService, BroadcastService, ComplaintId, EconomyConfig, ModerationService,
    ReferralService, UserId, Verdict,
};
use reciprocity::outbound::notify::{TokioSleeper, TracingNotifier};
use reciprocity::outbound::persistence::{
    DbPool, DieselLinkRepository, DieselModerationRepository, DieselStores,
    DieselUserRepository, PoolConfig, run_pending_migrations,
};
use reciprocity::settings::EngineSettings;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

/// `reciprocity-admin` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "reciprocity-admin",
    about = "Moderate complaints, bans, and referrals in the ledger store",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to the engine settings.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// List pending complaints, newest first.
    Complaints,
    /// Decide a pending complaint.
    Resolve {
        complaint: i64,
        /// One of `violation`, `nonviolation`, or `ban`.
        #[arg(long)]
        verdict: Verdict,
        #[arg(long)]
        note: Option<String>,
    },
    /// Ban a user, permanently unless `--days` is given.
    Ban {
        user: i64,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        days: Option<i64>,
    },
    /// Lift every active ban on a user.
    Unban { user: i64 },
    /// Show a user's referral code and earnings.
    ReferralSummary { user: i64 },
    /// Assign referral codes to every account lacking one.
    BackfillReferralCodes,
    /// Send a message to every account that is not banned.
    Broadcast { text: String },
}

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    // Flags belong to clap; settings come from the environment and files.
    let settings = EngineSettings::load_from_iter([OsString::from("reciprocity-admin")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    let database_url = args
        .database_url
        .filter(|url| !url.trim().is_empty())
        .or_else(|| settings.database_url())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "database URL missing: pass --database-url or set RECIPROCITY_DATABASE_URL",
            )
        })?;

    if matches!(args.command, Command::Migrate) {
        let applied = run_pending_migrations(&database_url)
            .await
            .map_err(|error| io::Error::other(format!("run migrations: {error}")))?;
        println!("applied={}", applied.len());
        for version in applied {
            println!("migration={version}");
        }
        return Ok(());
    }

    let pool = DbPool::new(PoolConfig::new(&database_url).with_max_size(settings.pool_max_size))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
    let admin = Admin::new(DieselStores::new(pool), &settings);
    admin.run(args.command).await
}

type Moderation = ModerationService<
    DieselModerationRepository,
    DieselUserRepository,
    DieselLinkRepository,
    TracingNotifier,
>;

struct Admin {
    stores: DieselStores,
    settings: EngineSettings,
    economy: Arc<EconomyConfig>,
    clock: Arc<dyn Clock>,
    notifier: Arc<TracingNotifier>,
}

impl Admin {
    fn new(stores: DieselStores, settings: &EngineSettings) -> Self {
        Self {
            stores,
            settings: settings.clone(),
            economy: Arc::new(EconomyConfig::default()),
            clock: Arc::new(DefaultClock),
            notifier: Arc::new(TracingNotifier),
        }
    }

    fn moderation(&self) -> Moderation {
        ModerationService::new(
            Arc::clone(&self.stores.moderation),
            Arc::clone(&self.stores.users),
            Arc::clone(&self.stores.links),
            Arc::clone(&self.notifier),
            Arc::clone(&self.economy),
            Arc::clone(&self.clock),
        )
        .with_admin_contact(self.settings.super_admin())
    }

    /// Internal id of the super-admin account, when it has registered.
    async fn admin_user(&self) -> io::Result<Option<UserId>> {
        let Some(external) = self.settings.super_admin() else {
            return Ok(None);
        };
        let accounts = AccountService::new(
            Arc::clone(&self.stores.users),
            Arc::clone(&self.stores.referrals),
            Arc::clone(&self.notifier),
            Arc::clone(&self.economy),
            Arc::clone(&self.clock),
        );
        let user = accounts
            .find_by_external_id(external)
            .await
            .map_err(|error| io::Error::other(format!("look up super-admin: {error}")))?;
        Ok(user.map(|account| account.id))
    }

    async fn run(&self, command: Command) -> io::Result<()> {
        match command {
            Command::Migrate => Ok(()),
            Command::Complaints => self.complaints().await,
            Command::Resolve {
                complaint,
                verdict,
                note,
            } => self.resolve(ComplaintId::new(complaint), verdict, note).await,
            Command::Ban { user, reason, days } => {
                self.ban(UserId::new(user), &reason, days).await
            }
            Command::Unban { user } => self.unban(UserId::new(user)).await,
            Command::ReferralSummary { user } => self.referral_summary(UserId::new(user)).await,
            Command::BackfillReferralCodes => self.backfill().await,
            Command::Broadcast { text } => self.broadcast(&text).await,
        }
    }

    async fn complaints(&self) -> io::Result<()> {
        let pending = self
            .moderation()
            .pending_complaints()
            .await
            .map_err(|error| io::Error::other(format!("list complaints: {error}")))?;
        println!("pending={}", pending.len());
        for complaint in pending {
            println!(
                "complaint={} link={} complainant={} accused={} category={} filed_at={}",
                complaint.id,
                complaint.link_id,
                complaint.complainant_id,
                complaint.accused_id,
                complaint.category,
                complaint.created_at.to_rfc3339()
            );
        }
        Ok(())
    }

    async fn resolve(
        &self,
        complaint: ComplaintId,
        verdict: Verdict,
        note: Option<String>,
    ) -> io::Result<()> {
        let admin = self.admin_user().await?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "resolving complaints needs RECIPROCITY_SUPER_ADMIN_EXTERNAL_ID set to a registered account",
            )
        })?;
        let resolution = self
            .moderation()
            .resolve_complaint(admin, complaint, verdict, note)
            .await
            .map_err(|error| io::Error::other(format!("resolve complaint: {error}")))?;
        println!("complaint={}", resolution.complaint.id);
        println!("verdict={}", resolution.verdict);
        println!("status={}", resolution.complaint.status.as_str());
        println!("accused={}", resolution.complaint.accused_id);
        println!("accused_state={:?}", resolution.accused_state);
        Ok(())
    }

    async fn ban(&self, user: UserId, reason: &str, days: Option<i64>) -> io::Result<()> {
        let admin = self.admin_user().await?;
        let ban = self
            .moderation()
            .ban(admin, user, reason, days.map(TimeDelta::days))
            .await
            .map_err(|error| io::Error::other(format!("ban user: {error}")))?;
        println!("ban={}", ban.id);
        println!("user={}", ban.user_id);
        match ban.expires_at {
            Some(expires_at) => println!("expires_at={}", expires_at.to_rfc3339()),
            None => println!("expires_at=never"),
        }
        Ok(())
    }

    async fn unban(&self, user: UserId) -> io::Result<()> {
        let admin = self.admin_user().await?;
        let lifted = self
            .moderation()
            .unban(admin, user)
            .await
            .map_err(|error| io::Error::other(format!("unban user: {error}")))?;
        println!("user={user}");
        println!("lifted={lifted}");
        Ok(())
    }

    async fn referral_summary(&self, user: UserId) -> io::Result<()> {
        let referrals = ReferralService::new(
            Arc::clone(&self.stores.users),
            Arc::clone(&self.stores.referrals),
            Arc::clone(&self.economy),
        );
        let summary = referrals
            .summary(user)
            .await
            .map_err(|error| io::Error::other(format!("referral summary: {error}")))?;
        println!("code={}", summary.code);
        println!("total_referred={}", summary.total_referred);
        println!("total_earned={}", summary.total_earned);
        Ok(())
    }

    async fn backfill(&self) -> io::Result<()> {
        let accounts = AccountService::new(
            Arc::clone(&self.stores.users),
            Arc::clone(&self.stores.referrals),
            Arc::clone(&self.notifier),
            Arc::clone(&self.economy),
            Arc::clone(&self.clock),
        );
        let assigned = accounts
            .backfill_referral_codes()
            .await
            .map_err(|error| io::Error::other(format!("backfill referral codes: {error}")))?;
        println!("assigned={assigned}");
        Ok(())
    }

    async fn broadcast(&self, text: &str) -> io::Result<()> {
        let sender = self.admin_user().await?;
        let broadcaster = BroadcastService::new(
            Arc::clone(&self.stores.users),
            Arc::clone(&self.notifier),
            Arc::new(TokioSleeper),
            Arc::clone(&self.clock),
            self.settings.broadcast_delay(),
        );
        let summary = broadcaster
            .broadcast(sender, text)
            .await
            .map_err(|error| io::Error::other(format!("broadcast: {error}")))?;
        println!("total={}", summary.total);
        println!("sent={}", summary.sent);
        println!("failed={}", summary.failures.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn parses_resolve_with_verdict_and_note() {
        let args = CliArgs::try_parse_from([
            "reciprocity-admin",
            "resolve",
            "7",
            "--verdict",
            "violation",
            "--note",
            "fake likes",
        ])
        .expect("arguments should parse");
        match args.command {
            Command::Resolve {
                complaint,
                verdict,
                note,
            } => {
                assert_eq!(complaint, 7);
                assert_eq!(verdict, Verdict::Violation);
                assert_eq!(note.as_deref(), Some("fake likes"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[rstest]
    fn rejects_unknown_verdict() {
        let parsed =
            CliArgs::try_parse_from(["reciprocity-admin", "resolve", "7", "--verdict", "maybe"]);
        assert!(parsed.is_err());
    }

    #[rstest]
    fn ban_days_are_optional() {
        let args = CliArgs::try_parse_from([
            "reciprocity-admin",
            "--database-url",
            "postgres://localhost/ledger",
            "ban",
            "12",
            "--reason",
            "spam",
        ])
        .expect("arguments should parse");
        assert_eq!(args.database_url.as_deref(), Some("postgres://localhost/ledger"));
        assert!(matches!(
            args.command,
            Command::Ban { user: 12, days: None, .. }
        ));
    }
}
