//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions into domain types validate
//! every stored enum and URL, surfacing corrupt rows as query errors.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::ports::LedgerStoreError;
use crate::domain::{
    ActionRequirement, Ban, BanId, Complaint, ComplaintId, ExternalUserId, Link, LinkId,
    LinkUrl, Platform, PlatformHandles, RequirementId, UnbanRequest, UnbanRequestId, User, UserId,
};

use super::schema::{
    action_requirements, action_transactions, bans, completed_url_actions, complaints, links,
    purchases, referral_bonuses, referrals, unban_requests, users,
};

/// Parse a stored textual value, reporting corruption as a query error.
pub(crate) fn parse_stored<T>(raw: &str, column: &str) -> Result<T, LedgerStoreError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|err| LedgerStoreError::query(format!("invalid stored {column}: {err}")))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: i64,
    pub external_id: i64,
    pub username: Option<String>,
    pub credits: i64,
    pub warnings: i32,
    pub rating: i64,
    pub behance_handle: Option<String>,
    pub dribbble_handle: Option<String>,
    pub artstation_handle: Option<String>,
    pub dprofile_handle: Option<String>,
    pub referral_code: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = LedgerStoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let warnings = u32::try_from(row.warnings)
            .map_err(|_| LedgerStoreError::query(format!("negative warnings for user {}", row.id)))?;
        let mut handles = PlatformHandles::default();
        handles.set(Platform::Behance, row.behance_handle);
        handles.set(Platform::Dribbble, row.dribbble_handle);
        handles.set(Platform::Artstation, row.artstation_handle);
        handles.set(Platform::Dprofile, row.dprofile_handle);
        Ok(Self {
            id: UserId::new(row.id),
            external_id: ExternalUserId::new(row.external_id),
            username: row.username,
            credits: row.credits,
            warnings,
            rating: row.rating,
            handles,
            referral_code: row.referral_code,
            language: row.language,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub external_id: i64,
    pub username: Option<&'a str>,
    pub language: &'a str,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Links and requirements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = links)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LinkRow {
    pub id: i64,
    pub owner_id: i64,
    pub url: String,
    pub platform: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<LinkRow> for Link {
    type Error = LedgerStoreError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: LinkId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            url: LinkUrl::parse(&row.url)
                .map_err(|err| LedgerStoreError::query(format!("invalid stored url: {err}")))?,
            platform: parse_stored(&row.platform, "platform")?,
            status: parse_stored(&row.status, "link status")?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = links)]
pub(crate) struct NewLinkRow<'a> {
    pub owner_id: i64,
    pub url: &'a str,
    pub platform: &'a str,
    pub status: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = action_requirements)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RequirementRow {
    pub id: i64,
    pub link_id: i64,
    pub action_type: String,
    pub target: i64,
    pub unit_cost: i64,
}

impl RequirementRow {
    /// Combine the stored row with its derived completion count.
    pub(crate) fn into_requirement(
        self,
        completed: i64,
    ) -> Result<ActionRequirement, LedgerStoreError> {
        Ok(ActionRequirement {
            id: RequirementId::new(self.id),
            link_id: LinkId::new(self.link_id),
            action_type: parse_stored(&self.action_type, "action type")?,
            target: self.target,
            unit_cost: self.unit_cost,
            completed,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = action_requirements)]
pub(crate) struct NewRequirementRow {
    pub link_id: i64,
    pub action_type: &'static str,
    pub target: i64,
    pub unit_cost: i64,
}

// ---------------------------------------------------------------------------
// Completions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = action_transactions)]
pub(crate) struct NewTransactionRow<'a> {
    pub user_id: i64,
    pub link_id: i64,
    pub link_url: &'a str,
    pub action_type: &'static str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = completed_url_actions)]
pub(crate) struct NewCompletedUrlRow<'a> {
    pub user_id: i64,
    pub link_url: &'a str,
    pub action_type: &'static str,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Moderation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = complaints)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ComplaintRow {
    pub id: i64,
    pub complainant_id: i64,
    pub accused_id: i64,
    pub link_id: i64,
    pub category: String,
    pub status: String,
    pub resolved_by: Option<i64>,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ComplaintRow> for Complaint {
    type Error = LedgerStoreError;

    fn try_from(row: ComplaintRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ComplaintId::new(row.id),
            complainant_id: UserId::new(row.complainant_id),
            accused_id: UserId::new(row.accused_id),
            link_id: LinkId::new(row.link_id),
            category: row.category,
            status: parse_stored(&row.status, "complaint status")?,
            resolved_by: row.resolved_by.map(UserId::new),
            admin_note: row.admin_note,
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = complaints)]
pub(crate) struct NewComplaintRow<'a> {
    pub complainant_id: i64,
    pub accused_id: i64,
    pub link_id: i64,
    pub category: &'a str,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bans)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct BanRow {
    pub id: i64,
    pub user_id: i64,
    pub reason: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub lifted_at: Option<DateTime<Utc>>,
    pub lifted_by: Option<i64>,
}

impl From<BanRow> for Ban {
    fn from(row: BanRow) -> Self {
        Self {
            id: BanId::new(row.id),
            user_id: UserId::new(row.user_id),
            reason: row.reason,
            expires_at: row.expires_at,
            issued_by: row.issued_by.map(UserId::new),
            created_at: row.created_at,
            lifted_at: row.lifted_at,
            lifted_by: row.lifted_by.map(UserId::new),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bans)]
pub(crate) struct NewBanRow<'a> {
    pub user_id: i64,
    pub reason: &'a str,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = unban_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UnbanRequestRow {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<i64>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl TryFrom<UnbanRequestRow> for UnbanRequest {
    type Error = LedgerStoreError;

    fn try_from(row: UnbanRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UnbanRequestId::new(row.id),
            user_id: UserId::new(row.user_id),
            status: parse_stored(&row.status, "unban request status")?,
            created_at: row.created_at,
            decided_by: row.decided_by.map(UserId::new),
            decided_at: row.decided_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = unban_requests)]
pub(crate) struct NewUnbanRequestRow {
    pub user_id: i64,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Referrals and purchases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = referrals)]
pub(crate) struct NewReferralRow {
    pub referred_id: i64,
    pub referrer_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = referral_bonuses)]
pub(crate) struct NewReferralBonusRow {
    pub referrer_id: i64,
    pub referred_id: i64,
    pub amount: i64,
    pub cause: &'static str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = purchases)]
pub(crate) struct NewPurchaseRow {
    pub user_id: i64,
    pub amount: i64,
    pub cost: i64,
    pub created_at: DateTime<Utc>,
}
