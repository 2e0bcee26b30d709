//! Complaints, bans, and unban requests for the in-memory ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ports::{
    ComplaintDecision, DecideComplaintOutcome, DecideUnbanOutcome, FileComplaintOutcome,
    LedgerStoreError, ModerationRepository, UnbanRequestOutcome,
};
use crate::domain::{
    Ban, BanDraft, BanId, Complaint, ComplaintDraft, ComplaintId, ComplaintStatus, Strike,
    UnbanDecision, UnbanRequest, UnbanRequestId, UnbanRequestStatus, UserId, Verdict,
    apply_strike,
};

use super::{MemoryLedgerStore, State, missing_user, next};

impl State {
    fn insert_ban(&mut self, draft: BanDraft, now: DateTime<Utc>) -> Ban {
        let ban = Ban {
            id: BanId::new(next(&mut self.seq.ban)),
            user_id: draft.user_id,
            reason: draft.reason,
            expires_at: draft.expires_at,
            issued_by: draft.issued_by,
            created_at: now,
            lifted_at: None,
            lifted_by: None,
        };
        self.bans.push(ban.clone());
        ban
    }

    fn lift(&mut self, user: UserId, lifted_by: Option<UserId>, now: DateTime<Utc>) -> u64 {
        let mut lifted = 0;
        for ban in self
            .bans
            .iter_mut()
            .filter(|ban| ban.user_id == user && ban.is_active(now))
        {
            ban.lifted_at = Some(now);
            ban.lifted_by = lifted_by;
            lifted += 1;
        }
        lifted
    }
}

#[async_trait]
impl ModerationRepository for MemoryLedgerStore {
    async fn file_complaint(
        &self,
        draft: ComplaintDraft,
        now: DateTime<Utc>,
    ) -> Result<FileComplaintOutcome, LedgerStoreError> {
        let mut state = self.lock()?;
        let Some(link) = state.links.get(&draft.link_id) else {
            return Ok(FileComplaintOutcome::LinkNotFound);
        };
        if link.owner_id != draft.complainant_id {
            return Ok(FileComplaintOutcome::NotOwner);
        }
        let matches = |tx: &super::TransactionRow| {
            tx.user_id == draft.accused_id
                && tx.link_id == draft.link_id
                && draft.action_type.is_none_or(|action| action == tx.action_type)
        };
        let before = state.transactions.len();
        state.transactions.retain(|_, tx| !matches(tx));
        let removed = u64::try_from(before - state.transactions.len()).unwrap_or(u64::MAX);
        if removed == 0 {
            return Ok(FileComplaintOutcome::NoSuchPerformance);
        }

        let id = ComplaintId::new(next(&mut state.seq.complaint));
        let complaint = Complaint {
            id,
            complainant_id: draft.complainant_id,
            accused_id: draft.accused_id,
            link_id: draft.link_id,
            category: draft.category,
            status: ComplaintStatus::Pending,
            resolved_by: None,
            admin_note: None,
            created_at: now,
            resolved_at: None,
        };
        state.complaints.insert(id, complaint.clone());
        state.refresh_rating(draft.accused_id);
        state.refresh_rating(draft.complainant_id);
        Ok(FileComplaintOutcome::Filed {
            complaint,
            removed_transactions: removed,
        })
    }

    async fn find_complaint(
        &self,
        id: ComplaintId,
    ) -> Result<Option<Complaint>, LedgerStoreError> {
        Ok(self.lock()?.complaints.get(&id).cloned())
    }

    async fn pending_complaints(&self) -> Result<Vec<Complaint>, LedgerStoreError> {
        let state = self.lock()?;
        let mut pending: Vec<Complaint> = state
            .complaints
            .values()
            .filter(|complaint| complaint.status == ComplaintStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(pending)
    }

    async fn decide_complaint(
        &self,
        decision: ComplaintDecision,
    ) -> Result<DecideComplaintOutcome, LedgerStoreError> {
        let mut state = self.lock()?;
        let Some(complaint) = state.complaints.get(&decision.complaint).cloned() else {
            return Ok(DecideComplaintOutcome::NotFound);
        };
        if complaint.status != ComplaintStatus::Pending {
            return Ok(DecideComplaintOutcome::AlreadyDecided(complaint));
        }
        let accused = complaint.accused_id;
        let current_warnings = state
            .users
            .get(&accused)
            .map(|user| user.warnings)
            .ok_or_else(|| missing_user(accused))?;

        let ban_draft = BanDraft {
            user_id: accused,
            reason: complaint.category.clone(),
            expires_at: None,
            issued_by: Some(decision.admin),
        };
        let (status, strike, ban) = match decision.verdict {
            Verdict::NonViolation => (ComplaintStatus::Rejected, None, None),
            Verdict::Violation => {
                let strike = apply_strike(current_warnings, decision.strike_threshold);
                state.user_mut(accused)?.warnings = strike.warnings();
                let ban = matches!(strike, Strike::Ban { .. })
                    .then(|| state.insert_ban(ban_draft, decision.now));
                (ComplaintStatus::Resolved, Some(strike), ban)
            }
            Verdict::Ban => {
                let ban = state.insert_ban(ban_draft, decision.now);
                (ComplaintStatus::Resolved, None, Some(ban))
            }
        };

        let stored = state
            .complaints
            .get_mut(&decision.complaint)
            .ok_or_else(|| LedgerStoreError::integrity("complaint vanished"))?;
        stored.status = status;
        stored.resolved_by = Some(decision.admin);
        stored.admin_note = decision.note;
        stored.resolved_at = Some(decision.now);
        let complaint = stored.clone();

        let accused_warnings = strike.map_or(current_warnings, Strike::warnings);
        Ok(DecideComplaintOutcome::Decided {
            complaint,
            strike,
            ban,
            accused_warnings,
        })
    }

    async fn issue_ban(
        &self,
        draft: BanDraft,
        now: DateTime<Utc>,
    ) -> Result<Ban, LedgerStoreError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&draft.user_id) {
            return Err(missing_user(draft.user_id));
        }
        Ok(state.insert_ban(draft, now))
    }

    async fn lift_bans(
        &self,
        user: UserId,
        lifted_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<u64, LedgerStoreError> {
        Ok(self.lock()?.lift(user, lifted_by, now))
    }

    async fn active_ban(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Ban>, LedgerStoreError> {
        Ok(self.lock()?.active_ban(user, now).cloned())
    }

    async fn ban_history(&self, user: UserId) -> Result<Vec<Ban>, LedgerStoreError> {
        let state = self.lock()?;
        let mut history: Vec<Ban> = state
            .bans
            .iter()
            .filter(|ban| ban.user_id == user)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(history)
    }

    async fn create_unban_request(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<UnbanRequestOutcome, LedgerStoreError> {
        let mut state = self.lock()?;
        if state.active_ban(user, now).is_none() {
            return Ok(UnbanRequestOutcome::NotBanned);
        }
        let last = state
            .unban_requests
            .values()
            .filter(|request| request.user_id == user && request.created_at >= window_start)
            .max_by_key(|request| (request.created_at, request.id))
            .cloned();
        if let Some(last) = last {
            return Ok(UnbanRequestOutcome::TooSoon { last });
        }

        let id = UnbanRequestId::new(next(&mut state.seq.unban_request));
        let request = UnbanRequest {
            id,
            user_id: user,
            status: UnbanRequestStatus::Pending,
            created_at: now,
            decided_by: None,
            decided_at: None,
        };
        state.unban_requests.insert(id, request.clone());
        Ok(UnbanRequestOutcome::Created(request))
    }

    async fn find_unban_request(
        &self,
        id: UnbanRequestId,
    ) -> Result<Option<UnbanRequest>, LedgerStoreError> {
        Ok(self.lock()?.unban_requests.get(&id).cloned())
    }

    async fn decide_unban_request(
        &self,
        id: UnbanRequestId,
        admin: UserId,
        decision: UnbanDecision,
        now: DateTime<Utc>,
    ) -> Result<DecideUnbanOutcome, LedgerStoreError> {
        let mut state = self.lock()?;
        let Some(request) = state.unban_requests.get_mut(&id) else {
            return Ok(DecideUnbanOutcome::NotFound);
        };
        if request.status != UnbanRequestStatus::Pending {
            return Ok(DecideUnbanOutcome::AlreadyDecided(request.clone()));
        }
        request.status = decision.status();
        request.decided_by = Some(admin);
        request.decided_at = Some(now);
        let request = request.clone();

        let lifted = match decision {
            UnbanDecision::Approve => state.lift(request.user_id, Some(admin), now),
            UnbanDecision::Decline => 0,
        };
        Ok(DecideUnbanOutcome::Decided { request, lifted })
    }
}
