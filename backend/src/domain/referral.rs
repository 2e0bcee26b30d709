//! One-level referral links, bonus causes, and referral codes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use super::{ExternalUserId, UserId};

/// Attempts made to find an unused referral code before giving up.
pub const REFERRAL_CODE_ATTEMPTS: usize = 5;

/// Event that caused a referral bonus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusCause {
    Registration,
    EarnedAction,
    Purchase,
}

impl BonusCause {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::EarnedAction => "earned_action",
            Self::Purchase => "purchase",
        }
    }
}

impl fmt::Display for BonusCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown bonus cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bonus cause: {0}")]
pub struct UnknownBonusCause(pub String);

impl FromStr for BonusCause {
    type Err = UnknownBonusCause;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "registration" => Ok(Self::Registration),
            "earned_action" => Ok(Self::EarnedAction),
            "purchase" => Ok(Self::Purchase),
            other => Err(UnknownBonusCause(other.to_owned())),
        }
    }
}

/// A bonus paid to a referrer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralBonus {
    pub referrer_id: UserId,
    pub referred_id: UserId,
    pub amount: i64,
    pub cause: BonusCause,
}

/// Totals shown to a user about the people they referred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSummary {
    pub code: String,
    pub total_referred: i64,
    pub total_earned: i64,
}

/// One referred user and what they have earned their referrer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferredUser {
    pub user_id: UserId,
    pub external_id: ExternalUserId,
    pub username: Option<String>,
    pub joined_at: DateTime<Utc>,
    pub bonus_earned: i64,
}

/// Result of presenting a referral code at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralAttachment {
    /// The link was created and the registration bonus paid.
    Attached(ReferralBonus),
    /// The user already has a referrer.
    AlreadyReferred,
    /// No user holds the presented code.
    UnknownCode,
    /// The code belongs to the registering user.
    SelfReferral,
    /// The code's owner was referred by the registering user.
    Circular,
}

/// Generate a random uppercase alphanumeric code of `length` characters.
pub fn generate_referral_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_uppercase())
        .collect()
}

/// Canonical form of a code typed by a user.
pub fn normalise_referral_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(trimmed.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use rstest::rstest;

    #[rstest]
    fn generated_codes_are_uppercase_alphanumeric() {
        let mut rng = SmallRng::seed_from_u64(7);
        let code = generate_referral_code(&mut rng, 8);
        assert_eq!(code.len(), 8);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[rstest]
    #[case(" ab12cd ", Some("AB12CD"))]
    #[case("", None)]
    #[case("ab-12", None)]
    fn normalises_typed_codes(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalise_referral_code(raw).as_deref(), expected);
    }

    #[rstest]
    fn bonus_causes_round_trip_through_text() {
        for cause in [
            BonusCause::Registration,
            BonusCause::EarnedAction,
            BonusCause::Purchase,
        ] {
            assert_eq!(cause.as_str().parse::<BonusCause>(), Ok(cause));
        }
    }
}
