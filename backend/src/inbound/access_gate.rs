//! Single ban check applied before every user-initiated action.

use std::sync::Arc;

use mockable::Clock;
use tracing::debug;

use crate::domain::ports::{LedgerStoreError, ModerationRepository, UserRepository};
use crate::domain::{Ban, DomainResult, Error, ExternalUserId};

/// Kind of inbound action being dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    /// A typed command or menu selection.
    Command,
    /// A button callback.
    Callback,
    /// Filing an unban request, reachable while banned.
    RequestUnban,
}

/// Whether the action may proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(Ban),
}

impl AccessDecision {
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

#[derive(Clone)]
pub struct AccessGate<U, M> {
    users: Arc<U>,
    moderation: Arc<M>,
    clock: Arc<dyn Clock>,
    super_admin: Option<ExternalUserId>,
}

impl<U, M> AccessGate<U, M> {
    pub fn new(
        users: Arc<U>,
        moderation: Arc<M>,
        clock: Arc<dyn Clock>,
        super_admin: Option<ExternalUserId>,
    ) -> Self {
        Self {
            users,
            moderation,
            clock,
            super_admin,
        }
    }
}

fn map_gate_error(error: LedgerStoreError) -> Error {
    match error {
        LedgerStoreError::Connection { message } => {
            Error::service_unavailable(format!("access check unavailable: {message}"))
        }
        other => Error::internal(format!("access check failed: {other}")),
    }
}

impl<U, M> AccessGate<U, M>
where
    U: UserRepository,
    M: ModerationRepository,
{
    /// Decide whether `sender` may perform `action`.
    ///
    /// The super-admin and unban requests always pass. Unknown senders pass
    /// so that registration can happen downstream.
    pub async fn check(
        &self,
        sender: ExternalUserId,
        action: GatedAction,
    ) -> DomainResult<AccessDecision> {
        if self.super_admin == Some(sender) || action == GatedAction::RequestUnban {
            return Ok(AccessDecision::Allowed);
        }
        let Some(user) = self
            .users
            .find_by_external_id(sender)
            .await
            .map_err(map_gate_error)?
        else {
            return Ok(AccessDecision::Allowed);
        };
        match self
            .moderation
            .active_ban(user.id, self.clock.utc())
            .await
            .map_err(map_gate_error)?
        {
            Some(ban) => {
                debug!(user_id = %user.id, ?action, "action denied by active ban");
                Ok(AccessDecision::Denied(ban))
            }
            None => Ok(AccessDecision::Allowed),
        }
    }
}
