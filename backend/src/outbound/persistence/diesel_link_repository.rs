//! PostgreSQL-backed `LinkRepository` implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{
    AddLinkOutcome, DeleteLinkOutcome, LedgerStoreError, LinkRepository, NewLink,
};
use crate::domain::{
    CompletionPolicy, ExternalUserId, Link, LinkDetails, LinkId, LinkStatus, Performer,
    TransactionId, UserId, drafts_total, refund,
};

use super::error_mapping::map_pool_error;
use super::ledger_queries::{
    adjust_balance, debit_if_covered, lock_link, refresh_rating, requirements_of, try_complete,
};
use super::models::{LinkRow, NewLinkRow, NewRequirementRow, parse_stored};
use super::pool::DbPool;
use super::schema::{action_requirements, action_transactions, complaints, links, users};

/// Diesel-backed link storage.
#[derive(Clone)]
pub struct DieselLinkRepository {
    pool: DbPool,
}

impl DieselLinkRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn with_requirements(
    conn: &mut AsyncPgConnection,
    link: Link,
) -> Result<LinkDetails, LedgerStoreError> {
    let requirements = requirements_of(conn, link.id).await?;
    Ok(LinkDetails { link, requirements })
}

#[async_trait]
impl LinkRepository for DieselLinkRepository {
    async fn create_link(&self, new_link: NewLink) -> Result<AddLinkOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let required = drafts_total(&new_link.requirements);
                let balance = match debit_if_covered(conn, new_link.owner, required).await? {
                    Ok(balance) => balance,
                    Err(balance) => {
                        return Ok(AddLinkOutcome::InsufficientFunds { balance, required });
                    }
                };

                let row: LinkRow = diesel::insert_into(links::table)
                    .values(&NewLinkRow {
                        owner_id: new_link.owner.get(),
                        url: new_link.url.as_str(),
                        platform: new_link.platform.as_str(),
                        status: LinkStatus::Active.as_str(),
                        created_at: new_link.created_at,
                    })
                    .returning(LinkRow::as_returning())
                    .get_result(conn)
                    .await?;
                let rows: Vec<NewRequirementRow> = new_link
                    .requirements
                    .iter()
                    .map(|draft| NewRequirementRow {
                        link_id: row.id,
                        action_type: draft.action_type.as_str(),
                        target: draft.target,
                        unit_cost: draft.unit_cost,
                    })
                    .collect();
                diesel::insert_into(action_requirements::table)
                    .values(&rows)
                    .execute(conn)
                    .await?;
                refresh_rating(conn, new_link.owner).await?;

                let details = with_requirements(conn, Link::try_from(row)?).await?;
                Ok(AddLinkOutcome::Created { details, balance })
            }
            .scope_boxed()
        })
        .await
    }

    async fn find_link(&self, id: LinkId) -> Result<Option<LinkDetails>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<LinkRow> = links::table
            .find(id.get())
            .select(LinkRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        match row {
            Some(row) => Ok(Some(with_requirements(&mut conn, Link::try_from(row)?).await?)),
            None => Ok(None),
        }
    }

    async fn links_by_owner(&self, owner: UserId) -> Result<Vec<LinkDetails>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<LinkRow> = links::table
            .filter(links::owner_id.eq(owner.get()))
            .order((links::created_at.desc(), links::id.desc()))
            .select(LinkRow::as_select())
            .load(&mut conn)
            .await?;
        let mut owned = Vec::with_capacity(rows.len());
        for row in rows {
            owned.push(with_requirements(&mut conn, Link::try_from(row)?).await?);
        }
        Ok(owned)
    }

    async fn performers(&self, id: LinkId) -> Result<Vec<Performer>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(i64, i64, i64, Option<String>, String, DateTime<Utc>)> =
            action_transactions::table
                .inner_join(users::table)
                .filter(action_transactions::link_id.eq(id.get()))
                .order((
                    action_transactions::created_at.asc(),
                    action_transactions::id.asc(),
                ))
                .select((
                    action_transactions::id,
                    users::id,
                    users::external_id,
                    users::username,
                    action_transactions::action_type,
                    action_transactions::created_at,
                ))
                .load(&mut conn)
                .await?;
        rows.into_iter()
            .map(
                |(transaction_id, user_id, external_id, username, action_type, performed_at)| {
                    Ok(Performer {
                        transaction_id: TransactionId::new(transaction_id),
                        user_id: UserId::new(user_id),
                        external_id: ExternalUserId::new(external_id),
                        username,
                        action_type: parse_stored(&action_type, "action type")?,
                        performed_at,
                    })
                },
            )
            .collect()
    }

    async fn complete_if_served(
        &self,
        id: LinkId,
        policy: CompletionPolicy,
    ) -> Result<Option<Link>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                match lock_link(conn, id).await? {
                    Some(link) => try_complete(conn, &link, policy).await,
                    None => Ok(None),
                }
            }
            .scope_boxed()
        })
        .await
    }

    async fn delete_link(
        &self,
        owner: UserId,
        id: LinkId,
        refund_percent: i64,
    ) -> Result<DeleteLinkOutcome, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        conn.transaction(|conn| {
            async move {
                let Some(link) = lock_link(conn, id).await? else {
                    return Ok(DeleteLinkOutcome::NotFound);
                };
                if link.owner_id != owner {
                    return Ok(DeleteLinkOutcome::NotOwner);
                }
                let refund = refund(&requirements_of(conn, id).await?, refund_percent);
                let performers: Vec<i64> = action_transactions::table
                    .filter(action_transactions::link_id.eq(id.get()))
                    .select(action_transactions::user_id)
                    .distinct()
                    .load(conn)
                    .await?;

                diesel::delete(complaints::table.filter(complaints::link_id.eq(id.get())))
                    .execute(conn)
                    .await?;
                diesel::delete(
                    action_transactions::table.filter(action_transactions::link_id.eq(id.get())),
                )
                .execute(conn)
                .await?;
                diesel::delete(
                    action_requirements::table.filter(action_requirements::link_id.eq(id.get())),
                )
                .execute(conn)
                .await?;
                diesel::delete(links::table.find(id.get()))
                    .execute(conn)
                    .await?;

                let balance = adjust_balance(conn, owner, refund).await?;
                refresh_rating(conn, owner).await?;
                for performer in performers {
                    refresh_rating(conn, UserId::new(performer)).await?;
                }
                Ok(DeleteLinkOutcome::Deleted { refund, balance })
            }
            .scope_boxed()
        })
        .await
    }
}
