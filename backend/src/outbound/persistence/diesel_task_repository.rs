//! PostgreSQL-backed `TaskRepository` implementation.

use async_trait::async_trait;
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Array, BigInt, Text, Timestamptz};
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};

use crate::domain::ports::{
    CompletionRequest, LedgerStoreError, TaskOffer, TaskQuery, TaskRepository,
};
use crate::domain::{
    ActionRequirement, BonusCause, CompletionOutcome, CompletionReceipt, Link, LinkProgress,
    LinkStatus, RequirementId, TransactionId, share_floor,
};

use super::error_mapping::map_pool_error;
use super::ledger_queries::{
    adjust_balance, lock_link, pay_referrer, refresh_rating, requirements_of, try_complete,
};
use super::models::{LinkRow, NewCompletedUrlRow, NewTransactionRow, parse_stored};
use super::pool::DbPool;
use super::schema::{action_transactions, completed_url_actions};

/// Newest active links first, each paired with its lowest-id requirement
/// the user may still earn.
const ELIGIBLE_TASKS_SQL: &str = r"
WITH progress AS (
    SELECT r.id AS requirement_id, COUNT(t.id) AS completed
    FROM action_requirements r
    LEFT JOIN action_transactions t
        ON t.link_id = r.link_id AND t.action_type = r.action_type
    GROUP BY r.id
)
SELECT DISTINCT ON (l.created_at, l.id)
    l.id, l.owner_id, l.url, l.platform, l.status, l.created_at,
    r.id AS requirement_id, r.action_type, r.target, r.unit_cost, p.completed
FROM links l
JOIN action_requirements r ON r.link_id = l.id
JOIN progress p ON p.requirement_id = r.id
WHERE l.status = 'active'
  AND l.owner_id <> $1
  AND l.platform = ANY($2)
  AND p.completed < r.target
  AND NOT EXISTS (
      SELECT 1 FROM action_transactions t
      WHERE t.user_id = $1
        AND t.action_type = r.action_type
        AND (t.link_id = l.id OR (t.link_url = l.url AND t.created_at >= $3))
  )
  AND NOT EXISTS (
      SELECT 1 FROM completed_url_actions c
      WHERE c.user_id = $1 AND c.link_url = l.url AND c.action_type = r.action_type
  )
ORDER BY l.created_at DESC, l.id ASC, r.id ASC
LIMIT $4
";

#[derive(Debug, QueryableByName)]
struct OfferRow {
    #[diesel(embed)]
    link: LinkRow,
    #[diesel(sql_type = BigInt)]
    requirement_id: i64,
    #[diesel(sql_type = Text)]
    action_type: String,
    #[diesel(sql_type = BigInt)]
    target: i64,
    #[diesel(sql_type = BigInt)]
    unit_cost: i64,
    #[diesel(sql_type = BigInt)]
    completed: i64,
}

impl TryFrom<OfferRow> for TaskOffer {
    type Error = LedgerStoreError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let link = Link::try_from(row.link)?;
        let requirement = ActionRequirement {
            id: RequirementId::new(row.requirement_id),
            link_id: link.id,
            action_type: parse_stored(&row.action_type, "action type")?,
            target: row.target,
            unit_cost: row.unit_cost,
            completed: row.completed,
        };
        Ok(Self { link, requirement })
    }
}

/// Diesel-backed task matching and completion recording.
#[derive(Clone)]
pub struct DieselTaskRepository {
    pool: DbPool,
}

impl DieselTaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for DieselTaskRepository {
    async fn eligible_tasks(&self, query: TaskQuery) -> Result<Vec<TaskOffer>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let platforms: Vec<String> = query
            .platforms
            .iter()
            .map(|platform| platform.as_str().to_owned())
            .collect();
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows: Vec<OfferRow> = sql_query(ELIGIBLE_TASKS_SQL)
            .bind::<BigInt, _>(query.user.get())
            .bind::<Array<Text>, _>(&platforms)
            .bind::<Timestamptz, _>(query.cooldown_since)
            .bind::<BigInt, _>(limit)
            .load(&mut conn)
            .await?;
        rows.into_iter().map(TaskOffer::try_from).collect()
    }

    async fn record_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let Some(link) = lock_link(conn, request.link).await? else {
                    return Ok(CompletionOutcome::NotEligible);
                };
                if link.owner_id == request.user {
                    return Ok(CompletionOutcome::SelfActionForbidden);
                }
                let requirements = requirements_of(conn, link.id).await?;
                let Some(requirement) = requirements
                    .iter()
                    .find(|row| row.action_type == request.action_type)
                    .copied()
                else {
                    return Ok(CompletionOutcome::NotEligible);
                };

                let action = request.action_type.as_str();
                let user = request.user.get();
                let already_done: bool = diesel::select(exists(
                    action_transactions::table
                        .filter(action_transactions::user_id.eq(user))
                        .filter(action_transactions::link_id.eq(link.id.get()))
                        .filter(action_transactions::action_type.eq(action)),
                ))
                .get_result(conn)
                .await?;
                if already_done {
                    return Ok(CompletionOutcome::AlreadyDone);
                }
                let recent: bool = diesel::select(exists(
                    action_transactions::table
                        .filter(action_transactions::user_id.eq(user))
                        .filter(action_transactions::link_url.eq(link.url.as_str()))
                        .filter(action_transactions::action_type.eq(action))
                        .filter(action_transactions::created_at.ge(request.cooldown_since)),
                ))
                .get_result(conn)
                .await?;
                let permanent: bool = diesel::select(exists(
                    completed_url_actions::table
                        .filter(completed_url_actions::user_id.eq(user))
                        .filter(completed_url_actions::link_url.eq(link.url.as_str()))
                        .filter(completed_url_actions::action_type.eq(action)),
                ))
                .get_result(conn)
                .await?;
                if recent || permanent {
                    return Ok(CompletionOutcome::CooldownActive);
                }
                if link.status != LinkStatus::Active || requirement.outstanding() == 0 {
                    return Ok(CompletionOutcome::NotEligible);
                }

                let transaction_id: i64 = diesel::insert_into(action_transactions::table)
                    .values(&NewTransactionRow {
                        user_id: user,
                        link_id: link.id.get(),
                        link_url: link.url.as_str(),
                        action_type: action,
                        created_at: request.now,
                    })
                    .returning(action_transactions::id)
                    .get_result(conn)
                    .await?;
                diesel::insert_into(completed_url_actions::table)
                    .values(&NewCompletedUrlRow {
                        user_id: user,
                        link_url: link.url.as_str(),
                        action_type: action,
                        completed_at: request.now,
                    })
                    .on_conflict_do_nothing()
                    .execute(conn)
                    .await?;

                let credited = requirement.unit_cost;
                let balance = adjust_balance(conn, request.user, credited).await?;
                let referral_bonus = pay_referrer(
                    conn,
                    request.user,
                    share_floor(credited, request.referral_percent),
                    BonusCause::EarnedAction,
                    request.now,
                )
                .await?;
                refresh_rating(conn, request.user).await?;
                refresh_rating(conn, link.owner_id).await?;

                let link_completed = try_complete(conn, &link, request.policy).await?.is_some();
                let progress = LinkProgress::of(&requirements_of(conn, link.id).await?);
                Ok(CompletionOutcome::Credited(CompletionReceipt {
                    transaction_id: TransactionId::new(transaction_id),
                    user_id: request.user,
                    link_id: link.id,
                    action_type: request.action_type,
                    credited,
                    balance,
                    progress,
                    link_completed,
                    owner_id: link.owner_id,
                    link_url: link.url,
                    referral_bonus,
                }))
            }
            .scope_boxed()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LinkId;
    use rstest::rstest;

    #[rstest]
    fn eligibility_query_orders_newest_links_first() {
        assert!(ELIGIBLE_TASKS_SQL.contains("ORDER BY l.created_at DESC, l.id ASC, r.id ASC"));
        assert!(ELIGIBLE_TASKS_SQL.contains("DISTINCT ON (l.created_at, l.id)"));
    }

    #[rstest]
    fn offer_rows_convert_into_domain_offers() {
        let row = OfferRow {
            link: LinkRow {
                id: 4,
                owner_id: 1,
                url: "https://behance.net/gallery/4/poster".to_owned(),
                platform: "behance".to_owned(),
                status: "active".to_owned(),
                created_at: crate::test_support::fixture_now(),
            },
            requirement_id: 9,
            action_type: "like".to_owned(),
            target: 3,
            unit_cost: 5,
            completed: 1,
        };
        let offer = TaskOffer::try_from(row).expect("valid row");
        assert_eq!(offer.link.id, LinkId::new(4));
        assert_eq!(offer.requirement.outstanding(), 2);
    }
}
