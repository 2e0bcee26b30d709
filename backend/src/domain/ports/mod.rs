//! Driven ports of the ledger core and supporting types.

mod macros;
pub(crate) use macros::define_port_error;

mod credit_ledger;
mod link_repository;
mod moderation_repository;
mod notifier;
mod referral_repository;
mod sleeper;
mod store_error;
mod task_repository;
mod user_repository;

pub use credit_ledger::CreditLedger;
#[cfg(test)]
pub use credit_ledger::MockCreditLedger;
#[cfg(test)]
pub use link_repository::MockLinkRepository;
pub use link_repository::{AddLinkOutcome, DeleteLinkOutcome, LinkRepository, NewLink};
#[cfg(test)]
pub use moderation_repository::MockModerationRepository;
pub use moderation_repository::{
    ComplaintDecision, DecideComplaintOutcome, DecideUnbanOutcome, FileComplaintOutcome,
    ModerationRepository, UnbanRequestOutcome,
};
#[cfg(test)]
pub use notifier::MockNotifier;
pub use notifier::{DeliveryError, FixtureNotifier, NoOpNotifier, Notifier};
#[cfg(test)]
pub use referral_repository::MockReferralRepository;
pub use referral_repository::ReferralRepository;
#[cfg(test)]
pub use sleeper::MockSleeper;
pub use sleeper::{ImmediateSleeper, Sleeper};
pub use store_error::LedgerStoreError;
#[cfg(test)]
pub use task_repository::MockTaskRepository;
pub use task_repository::{CompletionRequest, TaskOffer, TaskQuery, TaskRepository};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{CodeAssignment, NewUser, UserRepository};
