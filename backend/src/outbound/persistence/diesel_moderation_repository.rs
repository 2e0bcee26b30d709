//! PostgreSQL-backed `ModerationRepository` implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{
    ComplaintDecision, DecideComplaintOutcome, DecideUnbanOutcome, FileComplaintOutcome,
    LedgerStoreError, ModerationRepository, UnbanRequestOutcome,
};
use crate::domain::{
    Ban, BanDraft, Complaint, ComplaintDraft, ComplaintId, ComplaintStatus, Strike,
    UnbanDecision, UnbanRequest, UnbanRequestId, UnbanRequestStatus, UserId, Verdict,
    apply_strike,
};

use super::error_mapping::map_pool_error;
use super::ledger_queries::{active_ban, lift_active_bans, lock_link, refresh_rating};
use super::models::{
    BanRow, ComplaintRow, NewBanRow, NewComplaintRow, NewUnbanRequestRow, UnbanRequestRow,
};
use super::pool::DbPool;
use super::schema::{action_transactions, bans, complaints, unban_requests, users};

/// Diesel-backed complaints, bans, and unban requests.
#[derive(Clone)]
pub struct DieselModerationRepository {
    pool: DbPool,
}

impl DieselModerationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn insert_ban(
    conn: &mut AsyncPgConnection,
    draft: &BanDraft,
    now: DateTime<Utc>,
) -> Result<Ban, LedgerStoreError> {
    let row: BanRow = diesel::insert_into(bans::table)
        .values(&NewBanRow {
            user_id: draft.user_id.get(),
            reason: &draft.reason,
            expires_at: draft.expires_at,
            issued_by: draft.issued_by.map(UserId::get),
            created_at: now,
        })
        .returning(BanRow::as_returning())
        .get_result(conn)
        .await?;
    Ok(Ban::from(row))
}

#[async_trait]
impl ModerationRepository for DieselModerationRepository {
    async fn file_complaint(
        &self,
        draft: ComplaintDraft,
        now: DateTime<Utc>,
    ) -> Result<FileComplaintOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let Some(link) = lock_link(conn, draft.link_id).await? else {
                    return Ok(FileComplaintOutcome::LinkNotFound);
                };
                if link.owner_id != draft.complainant_id {
                    return Ok(FileComplaintOutcome::NotOwner);
                }

                let performed = action_transactions::table
                    .filter(action_transactions::user_id.eq(draft.accused_id.get()))
                    .filter(action_transactions::link_id.eq(draft.link_id.get()));
                let removed = match draft.action_type {
                    Some(action) => {
                        diesel::delete(
                            performed.filter(action_transactions::action_type.eq(action.as_str())),
                        )
                        .execute(conn)
                        .await?
                    }
                    None => diesel::delete(performed).execute(conn).await?,
                };
                if removed == 0 {
                    return Ok(FileComplaintOutcome::NoSuchPerformance);
                }

                let row: ComplaintRow = diesel::insert_into(complaints::table)
                    .values(&NewComplaintRow {
                        complainant_id: draft.complainant_id.get(),
                        accused_id: draft.accused_id.get(),
                        link_id: draft.link_id.get(),
                        category: &draft.category,
                        status: ComplaintStatus::Pending.as_str(),
                        created_at: now,
                    })
                    .returning(ComplaintRow::as_returning())
                    .get_result(conn)
                    .await?;
                refresh_rating(conn, draft.accused_id).await?;
                refresh_rating(conn, draft.complainant_id).await?;

                Ok(FileComplaintOutcome::Filed {
                    complaint: Complaint::try_from(row)?,
                    removed_transactions: u64::try_from(removed).unwrap_or(u64::MAX),
                })
            }
            .scope_boxed()
        })
        .await
    }

    async fn find_complaint(
        &self,
        id: ComplaintId,
    ) -> Result<Option<Complaint>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        complaints::table
            .find(id.get())
            .select(ComplaintRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(Complaint::try_from)
            .transpose()
    }

    async fn pending_complaints(&self) -> Result<Vec<Complaint>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ComplaintRow> = complaints::table
            .filter(complaints::status.eq(ComplaintStatus::Pending.as_str()))
            .order((complaints::created_at.desc(), complaints::id.desc()))
            .select(ComplaintRow::as_select())
            .load(&mut conn)
            .await?;
        rows.into_iter().map(Complaint::try_from).collect()
    }

    async fn decide_complaint(
        &self,
        decision: ComplaintDecision,
    ) -> Result<DecideComplaintOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let row: Option<ComplaintRow> = complaints::table
                    .find(decision.complaint.get())
                    .select(ComplaintRow::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let Some(complaint) = row.map(Complaint::try_from).transpose()? else {
                    return Ok(DecideComplaintOutcome::NotFound);
                };
                if complaint.status != ComplaintStatus::Pending {
                    return Ok(DecideComplaintOutcome::AlreadyDecided(complaint));
                }

                let accused = complaint.accused_id;
                let stored_warnings: Option<i32> = users::table
                    .find(accused.get())
                    .select(users::warnings)
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let current_warnings = stored_warnings
                    .and_then(|warnings| u32::try_from(warnings).ok())
                    .ok_or_else(|| {
                        LedgerStoreError::integrity(format!("user {accused} not found"))
                    })?;

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
                        let warnings = i32::try_from(strike.warnings()).unwrap_or(i32::MAX);
                        diesel::update(users::table.find(accused.get()))
                            .set(users::warnings.eq(warnings))
                            .execute(conn)
                            .await?;
                        let ban = match strike {
                            Strike::Ban { .. } => {
                                Some(insert_ban(conn, &ban_draft, decision.now).await?)
                            }
                            Strike::Warning { .. } => None,
                        };
                        (ComplaintStatus::Resolved, Some(strike), ban)
                    }
                    Verdict::Ban => {
                        let ban = insert_ban(conn, &ban_draft, decision.now).await?;
                        (ComplaintStatus::Resolved, None, Some(ban))
                    }
                };

                let updated: ComplaintRow =
                    diesel::update(complaints::table.find(decision.complaint.get()))
                        .set((
                            complaints::status.eq(status.as_str()),
                            complaints::resolved_by.eq(Some(decision.admin.get())),
                            complaints::admin_note.eq(decision.note.as_deref()),
                            complaints::resolved_at.eq(Some(decision.now)),
                        ))
                        .returning(ComplaintRow::as_returning())
                        .get_result(conn)
                        .await?;

                Ok(DecideComplaintOutcome::Decided {
                    complaint: Complaint::try_from(updated)?,
                    strike,
                    ban,
                    accused_warnings: strike.map_or(current_warnings, Strike::warnings),
                })
            }
            .scope_boxed()
        })
        .await
    }

    async fn issue_ban(
        &self,
        draft: BanDraft,
        now: DateTime<Utc>,
    ) -> Result<Ban, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        insert_ban(&mut conn, &draft, now).await
    }

    async fn lift_bans(
        &self,
        user: UserId,
        lifted_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<u64, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        lift_active_bans(&mut conn, user, lifted_by, now).await
    }

    async fn active_ban(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Ban>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        active_ban(&mut conn, user, now).await
    }

    async fn ban_history(&self, user: UserId) -> Result<Vec<Ban>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<BanRow> = bans::table
            .filter(bans::user_id.eq(user.get()))
            .order((bans::created_at.desc(), bans::id.desc()))
            .select(BanRow::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Ban::from).collect())
    }

    async fn create_unban_request(
        &self,
        user: UserId,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<UnbanRequestOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                if active_ban(conn, user, now).await?.is_none() {
                    return Ok(UnbanRequestOutcome::NotBanned);
                }
                let last: Option<UnbanRequestRow> = unban_requests::table
                    .filter(unban_requests::user_id.eq(user.get()))
                    .filter(unban_requests::created_at.ge(window_start))
                    .order((unban_requests::created_at.desc(), unban_requests::id.desc()))
                    .select(UnbanRequestRow::as_select())
                    .first(conn)
                    .await
                    .optional()?;
                if let Some(last) = last {
                    return Ok(UnbanRequestOutcome::TooSoon {
                        last: UnbanRequest::try_from(last)?,
                    });
                }
                let row: UnbanRequestRow = diesel::insert_into(unban_requests::table)
                    .values(&NewUnbanRequestRow {
                        user_id: user.get(),
                        status: UnbanRequestStatus::Pending.as_str(),
                        created_at: now,
                    })
                    .returning(UnbanRequestRow::as_returning())
                    .get_result(conn)
                    .await?;
                Ok(UnbanRequestOutcome::Created(UnbanRequest::try_from(row)?))
            }
            .scope_boxed()
        })
        .await
    }

    async fn find_unban_request(
        &self,
        id: UnbanRequestId,
    ) -> Result<Option<UnbanRequest>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        unban_requests::table
            .find(id.get())
            .select(UnbanRequestRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(UnbanRequest::try_from)
            .transpose()
    }

    async fn decide_unban_request(
        &self,
        id: UnbanRequestId,
        admin: UserId,
        decision: UnbanDecision,
        now: DateTime<Utc>,
    ) -> Result<DecideUnbanOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let row: Option<UnbanRequestRow> = unban_requests::table
                    .find(id.get())
                    .select(UnbanRequestRow::as_select())
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let Some(request) = row.map(UnbanRequest::try_from).transpose()? else {
                    return Ok(DecideUnbanOutcome::NotFound);
                };
                if request.status != UnbanRequestStatus::Pending {
                    return Ok(DecideUnbanOutcome::AlreadyDecided(request));
                }

                let updated: UnbanRequestRow = diesel::update(unban_requests::table.find(id.get()))
                    .set((
                        unban_requests::status.eq(decision.status().as_str()),
                        unban_requests::decided_by.eq(Some(admin.get())),
                        unban_requests::decided_at.eq(Some(now)),
                    ))
                    .returning(UnbanRequestRow::as_returning())
                    .get_result(conn)
                    .await?;
                let lifted = match decision {
                    UnbanDecision::Approve => {
                        lift_active_bans(conn, request.user_id, Some(admin), now).await?
                    }
                    UnbanDecision::Decline => 0,
                };
                Ok(DecideUnbanOutcome::Decided {
                    request: UnbanRequest::try_from(updated)?,
                    lifted,
                })
            }
            .scope_boxed()
        })
        .await
    }
}
