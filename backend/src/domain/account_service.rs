//! Account bootstrap, profile settings, and registration referrals.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info};

use super::ports::{NewUser, Notifier, ReferralRepository, UserRepository};
use super::service_support::{ensure_referral_code, map_store_error, notify_best_effort};
use super::{
    DEFAULT_LANGUAGE, DomainResult, EconomyConfig, Error, ExternalUserId, Notice, Platform,
    ReferralAttachment, User, UserId, UserStats, extract_handle, normalise_referral_code,
};

/// Result of registering (or re-contacting) an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub user: User,
    /// The account was created by this call.
    pub created: bool,
    /// Outcome of the presented referral code, if any.
    pub referral: Option<ReferralAttachment>,
}

#[derive(Clone)]
pub struct AccountService<U, R, N> {
    users: Arc<U>,
    referrals: Arc<R>,
    notifier: Arc<N>,
    economy: Arc<EconomyConfig>,
    clock: Arc<dyn Clock>,
}

impl<U, R, N> AccountService<U, R, N> {
    pub fn new(
        users: Arc<U>,
        referrals: Arc<R>,
        notifier: Arc<N>,
        economy: Arc<EconomyConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            referrals,
            notifier,
            economy,
            clock,
        }
    }
}

impl<U, R, N> AccountService<U, R, N>
where
    U: UserRepository,
    R: ReferralRepository,
    N: Notifier,
{
    /// Get or create the account for `external_id`, applying a referral code
    /// when one is presented.
    pub async fn register(
        &self,
        external_id: ExternalUserId,
        username: Option<&str>,
        referral_code: Option<&str>,
    ) -> DomainResult<Registration> {
        let now = self.clock.utc();
        let (user, created) = self
            .users
            .get_or_create(NewUser {
                external_id,
                username: username.map(str::to_owned),
                language: DEFAULT_LANGUAGE.to_owned(),
                created_at: now,
            })
            .await
            .map_err(map_store_error)?;
        if created {
            info!(user_id = %user.id, %external_id, "account created");
        }

        let referral = match referral_code.and_then(normalise_referral_code) {
            Some(code) => Some(self.apply_referral(&user, &code).await?),
            None => None,
        };
        Ok(Registration {
            user,
            created,
            referral,
        })
    }

    async fn apply_referral(&self, user: &User, code: &str) -> DomainResult<ReferralAttachment> {
        let Some(referrer) = self
            .users
            .find_by_referral_code(code)
            .await
            .map_err(map_store_error)?
        else {
            return Ok(ReferralAttachment::UnknownCode);
        };
        if referrer.id == user.id {
            return Ok(ReferralAttachment::SelfReferral);
        }
        let referrers_referrer = self
            .referrals
            .referrer_of(referrer.id)
            .await
            .map_err(map_store_error)?;
        if referrers_referrer == Some(user.id) {
            return Ok(ReferralAttachment::Circular);
        }

        let attachment = self
            .referrals
            .attach_referrer(
                user.id,
                referrer.id,
                self.economy.registration_bonus,
                self.clock.utc(),
            )
            .await
            .map_err(map_store_error)?;
        match attachment {
            ReferralAttachment::Attached(bonus) => {
                info!(
                    user_id = %user.id,
                    referrer_id = %referrer.id,
                    amount = bonus.amount,
                    "referral attached"
                );
                let notice = Notice::RegistrationBonus {
                    referred: user.username.clone(),
                    amount: bonus.amount,
                };
                notify_best_effort(self.notifier.as_ref(), referrer.external_id, &notice).await;
            }
            other => debug!(user_id = %user.id, ?other, "referral not attached"),
        }
        Ok(attachment)
    }

    pub async fn find_by_external_id(
        &self,
        external_id: ExternalUserId,
    ) -> DomainResult<Option<User>> {
        self.users
            .find_by_external_id(external_id)
            .await
            .map_err(map_store_error)
    }

    /// The user's referral code, generated on first request.
    pub async fn ensure_referral_code(&self, user: UserId) -> DomainResult<String> {
        ensure_referral_code(self.users.as_ref(), user, self.economy.referral_code_length).await
    }

    /// Give every account lacking a referral code a fresh one.
    pub async fn backfill_referral_codes(&self) -> DomainResult<usize> {
        let missing = self
            .users
            .users_without_referral_code()
            .await
            .map_err(map_store_error)?;
        let mut assigned = 0;
        for user in missing {
            self.ensure_referral_code(user).await?;
            assigned += 1;
        }
        info!(assigned, "referral codes backfilled");
        Ok(assigned)
    }

    /// Connect, change, or (with blank input) disconnect a platform profile.
    pub async fn set_platform_handle(
        &self,
        user: UserId,
        platform: Platform,
        input: &str,
    ) -> DomainResult<User> {
        let handle = extract_handle(platform, input)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let updated = self
            .users
            .set_handle(user, platform, handle)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("user {user} not found")))?;
        debug!(user_id = %user, %platform, "platform handle updated");
        Ok(updated)
    }

    /// Change the interface language to a short alphabetic code.
    pub async fn set_language(&self, user: UserId, code: &str) -> DomainResult<User> {
        let code = code.trim().to_ascii_lowercase();
        let valid = (2..=8).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic());
        if !valid {
            return Err(Error::invalid_request(format!(
                "unsupported language code: {code}"
            )));
        }
        self.users
            .set_language(user, &code)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("user {user} not found")))
    }

    pub async fn stats(&self, user: UserId) -> DomainResult<UserStats> {
        self.users
            .stats(user)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("user {user} not found")))
    }
}

#[cfg(test)]
#[path = "account_service_tests.rs"]
mod tests;
