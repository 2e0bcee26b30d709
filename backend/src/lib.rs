//! Mutual-action economy engine.
//!
//! Users spend credits to have their portfolio links viewed, liked,
//! commented on, or followed, and earn credits by performing those actions
//! for others. The crate holds the ledger core (matching, completion,
//! refunds), anti-abuse moderation, and the referral cascade, plus the
//! adapters that persist them.

pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
