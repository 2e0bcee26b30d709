//! Complaint intake, strike escalation, bans, and unban requests.
//!
//! Every state change is committed by the store before any notice is sent;
//! delivery failures are logged and never undo a decision.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ports::{
    ComplaintDecision, DecideComplaintOutcome, DecideUnbanOutcome, FileComplaintOutcome,
    LinkRepository, ModerationRepository, Notifier, UnbanRequestOutcome, UserRepository,
};
use super::service_support::{complete_and_notify, map_store_error, notify_best_effort};
use super::{
    AbuseState, ActionType, Ban, BanDraft, Complaint, ComplaintDraft, ComplaintId, DomainResult,
    EconomyConfig, Error, ExternalUserId, LinkId, Notice, Resolution, Strike, UnbanDecision,
    UnbanRequest, UnbanRequestId, UserId, Verdict,
};

/// A filed complaint and how many completions it removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintFiling {
    pub complaint: Complaint,
    pub removed_transactions: u64,
}

/// Result of a banned user's unban request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnbanRequestResult {
    Created(UnbanRequest),
    /// A request was filed recently; the next one is allowed at `retry_after`.
    TooSoon { retry_after: DateTime<Utc> },
    NotBanned,
}

#[derive(Clone)]
pub struct ModerationService<M, U, L, N> {
    moderation: Arc<M>,
    users: Arc<U>,
    links: Arc<L>,
    notifier: Arc<N>,
    economy: Arc<EconomyConfig>,
    clock: Arc<dyn Clock>,
    admin_contact: Option<ExternalUserId>,
}

impl<M, U, L, N> ModerationService<M, U, L, N> {
    pub fn new(
        moderation: Arc<M>,
        users: Arc<U>,
        links: Arc<L>,
        notifier: Arc<N>,
        economy: Arc<EconomyConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            moderation,
            users,
            links,
            notifier,
            economy,
            clock,
            admin_contact: None,
        }
    }

    /// Account that receives complaint and unban-request notices.
    #[must_use]
    pub fn with_admin_contact(mut self, admin: Option<ExternalUserId>) -> Self {
        self.admin_contact = admin;
        self
    }
}

impl<M, U, L, N> ModerationService<M, U, L, N>
where
    M: ModerationRepository,
    U: UserRepository,
    L: LinkRepository,
    N: Notifier,
{
    async fn notify_user(&self, user: UserId, notice: Notice) {
        match self.users.find_by_id(user).await {
            Ok(Some(account)) => {
                notify_best_effort(self.notifier.as_ref(), account.external_id, &notice).await;
            }
            Ok(None) => warn!(user_id = %user, "notice recipient not found"),
            Err(error) => warn!(user_id = %user, %error, "notice recipient lookup failed"),
        }
    }

    async fn notify_admin(&self, notice: Notice) {
        if let Some(admin) = self.admin_contact {
            notify_best_effort(self.notifier.as_ref(), admin, &notice).await;
        }
    }

    /// File a complaint against a performer on the complainant's own link.
    pub async fn file_complaint(
        &self,
        complainant: UserId,
        accused: UserId,
        link: LinkId,
        category: &str,
        action_type: Option<ActionType>,
    ) -> DomainResult<ComplaintFiling> {
        let category = category.trim();
        if category.is_empty() {
            return Err(Error::invalid_request("complaint category must not be empty"));
        }
        let draft = ComplaintDraft {
            complainant_id: complainant,
            accused_id: accused,
            link_id: link,
            category: category.to_owned(),
            action_type,
        };
        let outcome = self
            .moderation
            .file_complaint(draft, self.clock.utc())
            .await
            .map_err(map_store_error)?;

        match outcome {
            FileComplaintOutcome::Filed {
                complaint,
                removed_transactions,
            } => {
                info!(
                    complaint_id = %complaint.id,
                    link_id = %link,
                    user_id = %accused,
                    removed_transactions,
                    "complaint filed"
                );
                self.notify_admin(Notice::ComplaintFiled {
                    complaint_id: complaint.id,
                    link_id: link,
                    category: complaint.category.clone(),
                })
                .await;
                Ok(ComplaintFiling {
                    complaint,
                    removed_transactions,
                })
            }
            FileComplaintOutcome::LinkNotFound => {
                Err(Error::not_found(format!("link {link} not found")))
            }
            FileComplaintOutcome::NotOwner => Err(Error::forbidden(
                "only the link owner can file a complaint about it",
            )),
            FileComplaintOutcome::NoSuchPerformance => Err(Error::invalid_request(format!(
                "user {accused} has no matching completion on link {link}"
            ))),
        }
    }

    /// Pending complaints, newest first.
    pub async fn pending_complaints(&self) -> DomainResult<Vec<Complaint>> {
        self.moderation
            .pending_complaints()
            .await
            .map_err(map_store_error)
    }

    pub async fn complaint(&self, id: ComplaintId) -> DomainResult<Complaint> {
        self.moderation
            .find_complaint(id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("complaint {id} not found")))
    }

    /// Decide a complaint and apply the strike policy to the accused.
    pub async fn resolve_complaint(
        &self,
        admin: UserId,
        complaint: ComplaintId,
        verdict: Verdict,
        note: Option<String>,
    ) -> DomainResult<Resolution> {
        let now = self.clock.utc();
        let decision = ComplaintDecision {
            complaint,
            admin,
            verdict,
            note,
            now,
            strike_threshold: self.economy.strike_threshold,
        };
        let outcome = self
            .moderation
            .decide_complaint(decision)
            .await
            .map_err(map_store_error)?;

        let (complaint, strike, ban, warnings) = match outcome {
            DecideComplaintOutcome::Decided {
                complaint,
                strike,
                ban,
                accused_warnings,
            } => (complaint, strike, ban, accused_warnings),
            DecideComplaintOutcome::NotFound => {
                return Err(Error::not_found(format!("complaint {complaint} not found")));
            }
            DecideComplaintOutcome::AlreadyDecided(existing) => {
                return Err(Error::conflict(format!(
                    "complaint {} is already {}",
                    existing.id,
                    existing.status.as_str()
                )));
            }
        };
        info!(
            complaint_id = %complaint.id,
            user_id = %complaint.accused_id,
            %verdict,
            warnings,
            banned = ban.is_some(),
            "complaint decided"
        );

        self.notify_user(
            complaint.complainant_id,
            Notice::ComplaintDecided {
                complaint_id: complaint.id,
                upheld: verdict != Verdict::NonViolation,
            },
        )
        .await;
        match (&ban, strike) {
            (Some(ban), _) => {
                self.notify_user(
                    complaint.accused_id,
                    Notice::Banned {
                        reason: ban.reason.clone(),
                        expires_at: ban.expires_at,
                    },
                )
                .await;
            }
            (None, Some(Strike::Warning { warnings, remaining })) => {
                self.notify_user(
                    complaint.accused_id,
                    Notice::Warning {
                        warnings,
                        remaining,
                        category: complaint.category.clone(),
                    },
                )
                .await;
            }
            _ => {}
        }

        let banned = match ban {
            Some(_) => true,
            None => self
                .moderation
                .active_ban(complaint.accused_id, now)
                .await
                .map_err(map_store_error)?
                .is_some(),
        };

        complete_and_notify(
            self.links.as_ref(),
            self.users.as_ref(),
            self.notifier.as_ref(),
            complaint.link_id,
            self.economy.completion_policy,
        )
        .await?;

        Ok(Resolution {
            complaint,
            verdict,
            accused_state: AbuseState::of(warnings, banned),
        })
    }

    /// Ban a user directly. `duration` of `None` bans permanently.
    pub async fn ban(
        &self,
        admin: Option<UserId>,
        user: UserId,
        reason: &str,
        duration: Option<TimeDelta>,
    ) -> DomainResult<Ban> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::invalid_request("ban reason must not be empty"));
        }
        if duration.is_some_and(|d| d <= TimeDelta::zero()) {
            return Err(Error::invalid_request("ban duration must be positive"));
        }
        let now = self.clock.utc();
        let draft = BanDraft {
            user_id: user,
            reason: reason.to_owned(),
            expires_at: duration.map(|d| now + d),
            issued_by: admin,
        };
        let ban = self
            .moderation
            .issue_ban(draft, now)
            .await
            .map_err(map_store_error)?;
        info!(user_id = %user, ban_id = %ban.id, permanent = ban.is_permanent(), "user banned");
        self.notify_user(
            user,
            Notice::Banned {
                reason: ban.reason.clone(),
                expires_at: ban.expires_at,
            },
        )
        .await;
        Ok(ban)
    }

    /// Lift every active ban. Returns how many bans were lifted.
    pub async fn unban(&self, admin: Option<UserId>, user: UserId) -> DomainResult<u64> {
        let lifted = self
            .moderation
            .lift_bans(user, admin, self.clock.utc())
            .await
            .map_err(map_store_error)?;
        info!(user_id = %user, lifted, "bans lifted");
        if lifted > 0 {
            self.notify_user(user, Notice::Unbanned).await;
        }
        Ok(lifted)
    }

    /// The ban currently restricting `user`, if any.
    pub async fn active_ban(&self, user: UserId) -> DomainResult<Option<Ban>> {
        self.moderation
            .active_ban(user, self.clock.utc())
            .await
            .map_err(map_store_error)
    }

    pub async fn is_banned(&self, user: UserId) -> DomainResult<bool> {
        Ok(self.active_ban(user).await?.is_some())
    }

    /// Every ban ever issued to `user`, newest first.
    pub async fn ban_history(&self, user: UserId) -> DomainResult<Vec<Ban>> {
        self.moderation
            .ban_history(user)
            .await
            .map_err(map_store_error)
    }

    /// File an unban request, at most one per configured window.
    pub async fn request_unban(&self, user: UserId) -> DomainResult<UnbanRequestResult> {
        let now = self.clock.utc();
        let window = self.economy.unban_request_window();
        let outcome = self
            .moderation
            .create_unban_request(user, now, now - window)
            .await
            .map_err(map_store_error)?;
        match outcome {
            UnbanRequestOutcome::Created(request) => {
                info!(user_id = %user, request_id = %request.id, "unban requested");
                if let Ok(Some(account)) = self.users.find_by_id(user).await {
                    self.notify_admin(Notice::UnbanRequested {
                        request_id: request.id,
                        user: account.external_id,
                    })
                    .await;
                }
                Ok(UnbanRequestResult::Created(request))
            }
            UnbanRequestOutcome::TooSoon { last } => Ok(UnbanRequestResult::TooSoon {
                retry_after: last.created_at + window,
            }),
            UnbanRequestOutcome::NotBanned => Ok(UnbanRequestResult::NotBanned),
        }
    }

    /// Approve or decline an unban request.
    pub async fn decide_unban(
        &self,
        admin: UserId,
        request: UnbanRequestId,
        decision: UnbanDecision,
    ) -> DomainResult<UnbanRequest> {
        let outcome = self
            .moderation
            .decide_unban_request(request, admin, decision, self.clock.utc())
            .await
            .map_err(map_store_error)?;
        match outcome {
            DecideUnbanOutcome::Decided { request, lifted } => {
                info!(
                    request_id = %request.id,
                    user_id = %request.user_id,
                    status = request.status.as_str(),
                    lifted,
                    "unban request decided"
                );
                let notice = match decision {
                    UnbanDecision::Approve => Notice::Unbanned,
                    UnbanDecision::Decline => Notice::UnbanDeclined,
                };
                self.notify_user(request.user_id, notice).await;
                Ok(request)
            }
            DecideUnbanOutcome::NotFound => Err(Error::not_found(format!(
                "unban request {request} not found"
            ))),
            DecideUnbanOutcome::AlreadyDecided(existing) => Err(Error::conflict(format!(
                "unban request {} is already {}",
                existing.id,
                existing.status.as_str()
            ))),
        }
    }
}

#[cfg(test)]
#[path = "moderation_service_tests.rs"]
mod tests;
