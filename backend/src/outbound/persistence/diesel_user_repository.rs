//! PostgreSQL-backed `UserRepository` implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{exists, not};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};

use crate::domain::ports::{CodeAssignment, LedgerStoreError, NewUser, UserRepository};
use crate::domain::{ExternalUserId, Platform, User, UserId, UserStats};

use super::error_mapping::map_pool_error;
use super::ledger_queries::load_user;
use super::models::{NewUserRow, UserRow, parse_stored};
use super::pool::DbPool;
use super::schema::{action_requirements, action_transactions, bans, links, purchases, users};

/// Diesel-backed account storage.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn to_users(rows: Vec<UserRow>) -> Result<Vec<User>, LedgerStoreError> {
    rows.into_iter().map(User::try_from).collect()
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        load_user(&mut conn, id).await
    }

    async fn find_by_external_id(
        &self,
        external_id: ExternalUserId,
    ) -> Result<Option<User>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        users::table
            .filter(users::external_id.eq(external_id.get()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    async fn get_or_create(&self, new_user: NewUser) -> Result<(User, bool), LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let inserted: Option<UserRow> = diesel::insert_into(users::table)
            .values(&NewUserRow {
                external_id: new_user.external_id.get(),
                username: new_user.username.as_deref(),
                language: &new_user.language,
                created_at: new_user.created_at,
            })
            .on_conflict(users::external_id)
            .do_nothing()
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        if let Some(row) = inserted {
            return Ok((User::try_from(row)?, true));
        }

        let target = users::table.filter(users::external_id.eq(new_user.external_id.get()));
        let row: UserRow = match new_user.username.as_deref() {
            Some(username) => {
                diesel::update(target)
                    .set(users::username.eq(username))
                    .returning(UserRow::as_returning())
                    .get_result(&mut conn)
                    .await?
            }
            None => {
                target
                    .select(UserRow::as_select())
                    .first(&mut conn)
                    .await?
            }
        };
        Ok((User::try_from(row)?, false))
    }

    async fn find_by_referral_code(&self, code: &str) -> Result<Option<User>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        users::table
            .filter(users::referral_code.eq(code))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    async fn assign_referral_code(
        &self,
        id: UserId,
        code: &str,
    ) -> Result<CodeAssignment, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let code = code.to_owned();
        conn.transaction(|conn| {
            async move {
                let current: Option<Option<String>> = users::table
                    .find(id.get())
                    .select(users::referral_code)
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let Some(current) = current else {
                    return Err(LedgerStoreError::integrity(format!("user {id} not found")));
                };
                if let Some(existing) = current {
                    return Ok(CodeAssignment::AlreadySet(existing));
                }
                let taken: bool = diesel::select(exists(
                    users::table.filter(users::referral_code.eq(&code)),
                ))
                .get_result(conn)
                .await?;
                if taken {
                    return Ok(CodeAssignment::Collision);
                }
                diesel::update(users::table.find(id.get()))
                    .set(users::referral_code.eq(&code))
                    .execute(conn)
                    .await?;
                Ok(CodeAssignment::Assigned(code))
            }
            .scope_boxed()
        })
        .await
    }

    async fn users_without_referral_code(&self) -> Result<Vec<UserId>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let ids: Vec<i64> = users::table
            .filter(users::referral_code.is_null())
            .order((users::created_at.asc(), users::id.asc()))
            .select(users::id)
            .load(&mut conn)
            .await?;
        Ok(ids.into_iter().map(UserId::new).collect())
    }

    async fn set_handle(
        &self,
        id: UserId,
        platform: Platform,
        handle: Option<String>,
    ) -> Result<Option<User>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let handle = handle.filter(|value| !value.trim().is_empty());
        let target = users::table.find(id.get());
        let update = match platform {
            Platform::Behance => diesel::update(target)
                .set(users::behance_handle.eq(handle))
                .returning(UserRow::as_returning())
                .get_result(&mut conn)
                .await,
            Platform::Dribbble => diesel::update(target)
                .set(users::dribbble_handle.eq(handle))
                .returning(UserRow::as_returning())
                .get_result(&mut conn)
                .await,
            Platform::Artstation => diesel::update(target)
                .set(users::artstation_handle.eq(handle))
                .returning(UserRow::as_returning())
                .get_result(&mut conn)
                .await,
            Platform::Dprofile => diesel::update(target)
                .set(users::dprofile_handle.eq(handle))
                .returning(UserRow::as_returning())
                .get_result(&mut conn)
                .await,
        };
        update.optional()?.map(User::try_from).transpose()
    }

    async fn set_language(
        &self,
        id: UserId,
        language: &str,
    ) -> Result<Option<User>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(users::table.find(id.get()))
            .set(users::language.eq(language))
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?
            .map(User::try_from)
            .transpose()
    }

    async fn stats(&self, id: UserId) -> Result<Option<UserStats>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let Some(user) = load_user(&mut conn, id).await? else {
            return Ok(None);
        };

        let by_type: Vec<(String, i64)> = action_transactions::table
            .filter(action_transactions::user_id.eq(id.get()))
            .group_by(action_transactions::action_type)
            .select((action_transactions::action_type, diesel::dsl::count_star()))
            .load(&mut conn)
            .await?;
        let mut sent_by_type = BTreeMap::new();
        for (raw, count) in by_type {
            sent_by_type.insert(parse_stored(&raw, "action type")?, count);
        }
        let actions_sent = sent_by_type.values().sum();

        let links_added: i64 = links::table
            .filter(links::owner_id.eq(id.get()))
            .count()
            .get_result(&mut conn)
            .await?;
        let actions_received: i64 = action_transactions::table
            .inner_join(links::table)
            .filter(links::owner_id.eq(id.get()))
            .count()
            .get_result(&mut conn)
            .await?;
        let priced: Vec<(i64, i64)> = action_requirements::table
            .inner_join(links::table)
            .filter(links::owner_id.eq(id.get()))
            .select((action_requirements::target, action_requirements::unit_cost))
            .load(&mut conn)
            .await?;
        let purchased: Vec<i64> = purchases::table
            .filter(purchases::user_id.eq(id.get()))
            .select(purchases::amount)
            .load(&mut conn)
            .await?;

        Ok(Some(UserStats {
            actions_sent,
            actions_received,
            links_added,
            credits_purchased: purchased.iter().sum(),
            credits_spent: priced.iter().map(|(target, cost)| target * cost).sum(),
            sent_by_type,
            credits: user.credits,
            warnings: user.warnings,
            rating: user.rating,
        }))
    }

    async fn reachable_users(
        &self,
        now: DateTime<Utc>,
        except: Option<UserId>,
    ) -> Result<Vec<ExternalUserId>, LedgerStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let banned: Vec<i64> = bans::table
            .filter(bans::lifted_at.is_null())
            .filter(bans::expires_at.is_null().or(bans::expires_at.gt(now)))
            .select(bans::user_id)
            .distinct()
            .load(&mut conn)
            .await?;
        let mut query = users::table
            .filter(not(users::id.eq_any(banned)))
            .order(users::id.asc())
            .select(UserRow::as_select())
            .into_boxed();
        if let Some(except) = except {
            query = query.filter(users::id.ne(except.get()));
        }
        let rows: Vec<UserRow> = query.load(&mut conn).await?;
        Ok(to_users(rows)?
            .into_iter()
            .map(|user| user.external_id)
            .collect())
    }
}
