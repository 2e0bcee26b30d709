//! Domain primitives, ledger arithmetic, and the services driving them.
//!
//! Purpose: define the strongly typed entities of the mutual-action economy
//! and the services that enforce its rules on top of the driven ports in
//! [`ports`]. Pure arithmetic (refunds, bonuses, strikes, completion) lives
//! next to the entity it concerns so both store adapters share it.
//!
//! Public surface:
//! - Error / ErrorCode: failure payload with a stable code.
//! - EconomyConfig: every price, percentage, threshold, and window.
//! - Entities: User, Link, ActionRequirement, Complaint, Ban, UnbanRequest.
//! - Services: task matching, credit ledger, links, moderation, accounts,
//!   referrals, and broadcast.

pub mod account_service;
pub mod action;
pub mod ban;
pub mod broadcast_service;
pub mod complaint;
pub mod credit_ledger_service;
pub mod economy;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod link;
pub mod link_service;
pub mod moderation_service;
pub mod notice;
pub mod platform;
pub mod ports;
pub mod referral;
pub mod referral_service;
mod service_support;
pub mod task_matcher_service;
pub mod user;

pub use self::account_service::{AccountService, Registration};
pub use self::action::{ActionType, Cart, UnknownActionType};
pub use self::ban::{
    Ban, BanDraft, UnbanDecision, UnbanRequest, UnbanRequestStatus, UnknownUnbanRequestStatus,
};
pub use self::broadcast_service::{BroadcastFailure, BroadcastService, BroadcastSummary};
pub use self::complaint::{
    AbuseState, Complaint, ComplaintDraft, ComplaintStatus, Resolution, Strike,
    UnknownComplaintStatus, UnknownVerdict, Verdict, apply_strike,
};
pub use self::credit_ledger_service::CreditLedgerService;
pub use self::economy::{
    CompletionPolicy, EconomyConfig, PurchaseBundle, UnitCosts, share_floor, share_rounded,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::ids::{
    BanId, ComplaintId, ExternalUserId, LinkId, RequirementId, TransactionId, UnbanRequestId,
    UserId,
};
pub use self::ledger::{
    CompletionOutcome, CompletionReceipt, Purchase, PurchaseOutcome, SpendOutcome,
};
pub use self::link::{
    ActionRequirement, Link, LinkDetails, LinkProgress, LinkStatus, Performer, RequirementDraft,
    UnknownLinkStatus, drafts_total, is_served, next_pending, price_cart, refund, should_complete,
};
pub use self::link_service::{LinkRefund, LinkService, detect_platform};
pub use self::moderation_service::{
    ComplaintFiling, ModerationService, UnbanRequestResult,
};
pub use self::notice::Notice;
pub use self::platform::{
    HandleError, LinkUrl, LinkUrlError, Platform, UnknownPlatform, extract_handle,
};
pub use self::referral::{
    BonusCause, REFERRAL_CODE_ATTEMPTS, ReferralAttachment, ReferralBonus, ReferralSummary,
    ReferredUser, UnknownBonusCause, generate_referral_code, normalise_referral_code,
};
pub use self::referral_service::ReferralService;
pub use self::task_matcher_service::{MatchOutcome, TaskMatcherService};
pub use self::user::{DEFAULT_LANGUAGE, PlatformHandles, User, UserStats, rating};

/// Result alias for domain service operations.
pub type DomainResult<T> = Result<T, Error>;
