//! Helpers shared by the domain services.

use tracing::{info, warn};

use super::ports::{CodeAssignment, LedgerStoreError, LinkRepository, Notifier, UserRepository};
use super::{
    CompletionPolicy, Error, ExternalUserId, Link, LinkId, Notice, REFERRAL_CODE_ATTEMPTS, UserId,
    generate_referral_code,
};

/// Map a store failure onto the domain error vocabulary.
pub(crate) fn map_store_error(error: LedgerStoreError) -> Error {
    match error {
        LedgerStoreError::Connection { message } => {
            Error::service_unavailable(format!("ledger store unavailable: {message}"))
        }
        LedgerStoreError::Query { message } => {
            Error::internal(format!("ledger store error: {message}"))
        }
        LedgerStoreError::Integrity { message } => Error::conflict(message),
    }
}

/// Deliver a notice, logging and swallowing any failure.
///
/// Returns whether the notice was delivered.
pub(crate) async fn notify_best_effort<N>(
    notifier: &N,
    recipient: ExternalUserId,
    notice: &Notice,
) -> bool
where
    N: Notifier + ?Sized,
{
    match notifier.deliver(recipient, notice).await {
        Ok(()) => true,
        Err(error) => {
            warn!(%recipient, %error, "notice delivery failed");
            false
        }
    }
}

/// Complete `link` if it is now served and tell the owner.
///
/// Used after a complaint decision clears the pending-complaint blocker.
pub(crate) async fn complete_and_notify<L, U, N>(
    links: &L,
    users: &U,
    notifier: &N,
    link: LinkId,
    policy: CompletionPolicy,
) -> Result<Option<Link>, Error>
where
    L: LinkRepository + ?Sized,
    U: UserRepository + ?Sized,
    N: Notifier + ?Sized,
{
    let Some(completed) = links
        .complete_if_served(link, policy)
        .await
        .map_err(map_store_error)?
    else {
        return Ok(None);
    };
    info!(link_id = %link, "link completed");
    match users.find_by_id(completed.owner_id).await {
        Ok(Some(owner)) => {
            let notice = Notice::LinkCompleted {
                link_id: completed.id,
                url: completed.url.clone(),
            };
            notify_best_effort(notifier, owner.external_id, &notice).await;
        }
        Ok(None) => {}
        Err(error) => warn!(owner_id = %completed.owner_id, %error, "owner lookup failed"),
    }
    Ok(Some(completed))
}

/// Return the user's referral code, generating and storing one if absent.
pub(crate) async fn ensure_referral_code<U>(
    users: &U,
    user: UserId,
    length: usize,
) -> Result<String, Error>
where
    U: UserRepository + ?Sized,
{
    let account = users
        .find_by_id(user)
        .await
        .map_err(map_store_error)?
        .ok_or_else(|| Error::not_found(format!("user {user} not found")))?;
    if let Some(code) = account.referral_code {
        return Ok(code);
    }
    for attempt in 1..=REFERRAL_CODE_ATTEMPTS {
        let candidate = generate_referral_code(&mut rand::thread_rng(), length);
        match users
            .assign_referral_code(user, &candidate)
            .await
            .map_err(map_store_error)?
        {
            CodeAssignment::Assigned(code) => {
                info!(user_id = %user, "referral code assigned");
                return Ok(code);
            }
            CodeAssignment::AlreadySet(code) => return Ok(code),
            CodeAssignment::Collision => {
                warn!(user_id = %user, attempt, "referral code collision");
            }
        }
    }
    Err(Error::conflict(format!(
        "no unique referral code found after {REFERRAL_CODE_ATTEMPTS} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{DeliveryError, MockNotifier, MockUserRepository};
    use crate::test_support::sample_user;
    use rstest::rstest;

    #[rstest]
    #[case(LedgerStoreError::connection("refused"), ErrorCode::ServiceUnavailable)]
    #[case(LedgerStoreError::query("syntax"), ErrorCode::InternalError)]
    #[case(LedgerStoreError::integrity("duplicate"), ErrorCode::Conflict)]
    fn store_errors_map_to_codes(#[case] error: LedgerStoreError, #[case] expected: ErrorCode) {
        assert_eq!(map_store_error(error).code(), expected);
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_deliver()
            .times(1)
            .return_once(|_, _| Err(DeliveryError::transport("timeout")));

        let delivered =
            notify_best_effort(&notifier, ExternalUserId::new(5), &Notice::Unbanned).await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn existing_referral_code_is_returned_unchanged() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().return_once(|_| {
            let mut user = sample_user(3, 0);
            user.referral_code = Some("ABCD1234".to_owned());
            Ok(Some(user))
        });
        users.expect_assign_referral_code().times(0);

        let code = ensure_referral_code(&users, UserId::new(3), 8)
            .await
            .expect("code returned");
        assert_eq!(code, "ABCD1234");
    }

    #[tokio::test]
    async fn referral_code_generation_retries_collisions() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .return_once(|_| Ok(Some(sample_user(3, 0))));
        let mut seq = mockall::Sequence::new();
        users
            .expect_assign_referral_code()
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|_, _| Ok(CodeAssignment::Collision));
        users
            .expect_assign_referral_code()
            .withf(|_, code| code.len() == 8)
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|_, code| Ok(CodeAssignment::Assigned(code.to_owned())));

        let code = ensure_referral_code(&users, UserId::new(3), 8)
            .await
            .expect("code assigned");
        assert_eq!(code.len(), 8);
    }

    #[tokio::test]
    async fn referral_code_generation_gives_up() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .return_once(|_| Ok(Some(sample_user(3, 0))));
        users
            .expect_assign_referral_code()
            .times(REFERRAL_CODE_ATTEMPTS)
            .returning(|_, _| Ok(CodeAssignment::Collision));

        let err = ensure_referral_code(&users, UserId::new(3), 8)
            .await
            .expect_err("collisions exhaust attempts");
        assert_eq!(err.code(), ErrorCode::Conflict);
    }
}
