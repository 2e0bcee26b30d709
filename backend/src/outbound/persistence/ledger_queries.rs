//! Queries shared by the Diesel ledger adapters.
//!
//! Every helper runs on a borrowed connection so callers can compose them
//! inside one transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, exists};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::LedgerStoreError;
use crate::domain::{
    ActionRequirement, ActionType, Ban, BonusCause, CompletionPolicy, ComplaintStatus, Link,
    LinkId, LinkStatus, ReferralBonus, User, UserId, rating, should_complete,
};

use super::models::{BanRow, LinkRow, NewReferralBonusRow, RequirementRow, UserRow, parse_stored};
use super::schema::{
    action_requirements, action_transactions, bans, complaints, links, referral_bonuses,
    referrals, users,
};

fn missing_user(id: UserId) -> LedgerStoreError {
    LedgerStoreError::integrity(format!("user {id} not found"))
}

pub(crate) async fn load_user(
    conn: &mut AsyncPgConnection,
    id: UserId,
) -> Result<Option<User>, LedgerStoreError> {
    users::table
        .find(id.get())
        .select(UserRow::as_select())
        .first(conn)
        .await
        .optional()?
        .map(User::try_from)
        .transpose()
}

/// Add `delta` to a balance and return the new balance.
pub(crate) async fn adjust_balance(
    conn: &mut AsyncPgConnection,
    user: UserId,
    delta: i64,
) -> Result<i64, LedgerStoreError> {
    diesel::update(users::table.find(user.get()))
        .set(users::credits.eq(users::credits + delta))
        .returning(users::credits)
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| missing_user(user))
}

/// Remove `amount` from a balance only if it covers the amount.
///
/// Returns the new balance, or `Err(current)` when funds are short.
pub(crate) async fn debit_if_covered(
    conn: &mut AsyncPgConnection,
    user: UserId,
    amount: i64,
) -> Result<Result<i64, i64>, LedgerStoreError> {
    let debited: Option<i64> = diesel::update(
        users::table
            .find(user.get())
            .filter(users::credits.ge(amount)),
    )
    .set(users::credits.eq(users::credits - amount))
    .returning(users::credits)
    .get_result(conn)
    .await
    .optional()?;
    if let Some(balance) = debited {
        return Ok(Ok(balance));
    }
    let current: Option<i64> = users::table
        .find(user.get())
        .select(users::credits)
        .first(conn)
        .await
        .optional()?;
    current.map(Err).ok_or_else(|| missing_user(user))
}

/// Lock a link row for the rest of the transaction.
pub(crate) async fn lock_link(
    conn: &mut AsyncPgConnection,
    id: LinkId,
) -> Result<Option<Link>, LedgerStoreError> {
    links::table
        .find(id.get())
        .select(LinkRow::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()?
        .map(Link::try_from)
        .transpose()
}

/// Requirement rows of a link in id order with derived progress.
pub(crate) async fn requirements_of(
    conn: &mut AsyncPgConnection,
    link: LinkId,
) -> Result<Vec<ActionRequirement>, LedgerStoreError> {
    let rows: Vec<RequirementRow> = action_requirements::table
        .filter(action_requirements::link_id.eq(link.get()))
        .order(action_requirements::id.asc())
        .select(RequirementRow::as_select())
        .load(conn)
        .await?;
    let counts: Vec<(String, i64)> = action_transactions::table
        .filter(action_transactions::link_id.eq(link.get()))
        .group_by(action_transactions::action_type)
        .select((action_transactions::action_type, count_star()))
        .load(conn)
        .await?;
    let mut completed: HashMap<ActionType, i64> = HashMap::with_capacity(counts.len());
    for (raw, count) in counts {
        completed.insert(parse_stored(&raw, "action type")?, count);
    }
    rows.into_iter()
        .map(|row| {
            let action_type: ActionType = parse_stored(&row.action_type, "action type")?;
            let done = completed.get(&action_type).copied().unwrap_or(0);
            row.into_requirement(done)
        })
        .collect()
}

pub(crate) async fn has_pending_complaint(
    conn: &mut AsyncPgConnection,
    link: LinkId,
) -> Result<bool, LedgerStoreError> {
    Ok(diesel::select(exists(
        complaints::table
            .filter(complaints::link_id.eq(link.get()))
            .filter(complaints::status.eq(ComplaintStatus::Pending.as_str())),
    ))
    .get_result(conn)
    .await?)
}

/// Complete `link` when it is active, served, and unblocked.
pub(crate) async fn try_complete(
    conn: &mut AsyncPgConnection,
    link: &Link,
    policy: CompletionPolicy,
) -> Result<Option<Link>, LedgerStoreError> {
    if link.status != LinkStatus::Active {
        return Ok(None);
    }
    let requirements = requirements_of(conn, link.id).await?;
    let blocked = has_pending_complaint(conn, link.id).await?;
    if !should_complete(policy, &requirements, blocked) {
        return Ok(None);
    }
    diesel::update(
        links::table
            .find(link.id.get())
            .filter(links::status.eq(LinkStatus::Active.as_str())),
    )
    .set(links::status.eq(LinkStatus::Completed.as_str()))
    .returning(LinkRow::as_returning())
    .get_result(conn)
    .await
    .optional()?
    .map(Link::try_from)
    .transpose()
}

/// Pay the referrer of `referred`, if any, and log the bonus.
pub(crate) async fn pay_referrer(
    conn: &mut AsyncPgConnection,
    referred: UserId,
    amount: i64,
    cause: BonusCause,
    now: DateTime<Utc>,
) -> Result<Option<ReferralBonus>, LedgerStoreError> {
    if amount <= 0 {
        return Ok(None);
    }
    let referrer: Option<i64> = referrals::table
        .find(referred.get())
        .select(referrals::referrer_id)
        .first(conn)
        .await
        .optional()?;
    let Some(referrer) = referrer.map(UserId::new) else {
        return Ok(None);
    };
    adjust_balance(conn, referrer, amount).await?;
    diesel::insert_into(referral_bonuses::table)
        .values(&NewReferralBonusRow {
            referrer_id: referrer.get(),
            referred_id: referred.get(),
            amount,
            cause: cause.as_str(),
            created_at: now,
        })
        .execute(conn)
        .await?;
    Ok(Some(ReferralBonus {
        referrer_id: referrer,
        referred_id: referred,
        amount,
        cause,
    }))
}

/// Recompute the stored rating from activity counts.
pub(crate) async fn refresh_rating(
    conn: &mut AsyncPgConnection,
    user: UserId,
) -> Result<(), LedgerStoreError> {
    let sent: i64 = action_transactions::table
        .filter(action_transactions::user_id.eq(user.get()))
        .count()
        .get_result(conn)
        .await?;
    let links_added: i64 = links::table
        .filter(links::owner_id.eq(user.get()))
        .count()
        .get_result(conn)
        .await?;
    let received: i64 = action_transactions::table
        .inner_join(links::table)
        .filter(links::owner_id.eq(user.get()))
        .count()
        .get_result(conn)
        .await?;
    diesel::update(users::table.find(user.get()))
        .set(users::rating.eq(rating(sent, links_added, received)))
        .execute(conn)
        .await?;
    Ok(())
}

/// The most recently issued ban active at `now`.
pub(crate) async fn active_ban(
    conn: &mut AsyncPgConnection,
    user: UserId,
    now: DateTime<Utc>,
) -> Result<Option<Ban>, LedgerStoreError> {
    let row: Option<BanRow> = bans::table
        .filter(bans::user_id.eq(user.get()))
        .filter(bans::lifted_at.is_null())
        .filter(bans::expires_at.is_null().or(bans::expires_at.gt(now)))
        .order((bans::created_at.desc(), bans::id.desc()))
        .select(BanRow::as_select())
        .first(conn)
        .await
        .optional()?;
    Ok(row.map(Ban::from))
}

/// Stamp every ban active at `now` as lifted.
pub(crate) async fn lift_active_bans(
    conn: &mut AsyncPgConnection,
    user: UserId,
    lifted_by: Option<UserId>,
    now: DateTime<Utc>,
) -> Result<u64, LedgerStoreError> {
    let lifted = diesel::update(
        bans::table
            .filter(bans::user_id.eq(user.get()))
            .filter(bans::lifted_at.is_null())
            .filter(bans::expires_at.is_null().or(bans::expires_at.gt(now))),
    )
    .set((
        bans::lifted_at.eq(Some(now)),
        bans::lifted_by.eq(lifted_by.map(UserId::get)),
    ))
    .execute(conn)
    .await?;
    Ok(u64::try_from(lifted).unwrap_or(u64::MAX))
}
