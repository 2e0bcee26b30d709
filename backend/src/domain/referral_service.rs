//! Read side of the referral cascade.

use std::sync::Arc;

use super::ports::{ReferralRepository, UserRepository};
use super::service_support::{ensure_referral_code, map_store_error};
use super::{DomainResult, EconomyConfig, ReferralSummary, ReferredUser, UserId};

#[derive(Clone)]
pub struct ReferralService<U, R> {
    users: Arc<U>,
    referrals: Arc<R>,
    economy: Arc<EconomyConfig>,
}

impl<U, R> ReferralService<U, R> {
    pub fn new(users: Arc<U>, referrals: Arc<R>, economy: Arc<EconomyConfig>) -> Self {
        Self {
            users,
            referrals,
            economy,
        }
    }
}

impl<U, R> ReferralService<U, R>
where
    U: UserRepository,
    R: ReferralRepository,
{
    /// The user's code, how many people used it, and what they earned.
    pub async fn summary(&self, user: UserId) -> DomainResult<ReferralSummary> {
        let code =
            ensure_referral_code(self.users.as_ref(), user, self.economy.referral_code_length)
                .await?;
        let (total_referred, total_earned) = self
            .referrals
            .referral_totals(user)
            .await
            .map_err(map_store_error)?;
        Ok(ReferralSummary {
            code,
            total_referred,
            total_earned,
        })
    }

    pub async fn referrals(&self, user: UserId) -> DomainResult<Vec<ReferredUser>> {
        self.referrals
            .referrals(user)
            .await
            .map_err(map_store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockReferralRepository, MockUserRepository};
    use crate::test_support::sample_user;

    #[tokio::test]
    async fn summary_combines_code_and_totals() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().return_once(|_| {
            let mut user = sample_user(4, 0);
            user.referral_code = Some("DDDD0004".to_owned());
            Ok(Some(user))
        });
        let mut referrals = MockReferralRepository::new();
        referrals
            .expect_referral_totals()
            .return_once(|_| Ok((2, 56)));

        let summary = ReferralService::new(
            Arc::new(users),
            Arc::new(referrals),
            Arc::new(EconomyConfig::default()),
        )
        .summary(UserId::new(4))
        .await
        .expect("summary succeeds");

        assert_eq!(
            summary,
            ReferralSummary {
                code: "DDDD0004".to_owned(),
                total_referred: 2,
                total_earned: 56,
            }
        );
    }
}
