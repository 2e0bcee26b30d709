//! Diesel table definitions for the ledger schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Participant accounts and their balances.
    users (id) {
        id -> Int8,
        /// Messaging-platform identity; unique.
        external_id -> Int8,
        username -> Nullable<Text>,
        /// Never negative (CHECK constraint).
        credits -> Int8,
        warnings -> Int4,
        rating -> Int8,
        behance_handle -> Nullable<Text>,
        dribbble_handle -> Nullable<Text>,
        artstation_handle -> Nullable<Text>,
        dprofile_handle -> Nullable<Text>,
        referral_code -> Nullable<Text>,
        language -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    links (id) {
        id -> Int8,
        owner_id -> Int8,
        /// Normalised URL.
        url -> Text,
        platform -> Text,
        status -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// One row per (link, action type); progress is derived from
    /// `action_transactions`.
    action_requirements (id) {
        id -> Int8,
        link_id -> Int8,
        action_type -> Text,
        target -> Int8,
        unit_cost -> Int8,
    }
}

diesel::table! {
    action_transactions (id) {
        id -> Int8,
        user_id -> Int8,
        link_id -> Int8,
        /// Copy of the link URL used by the cooldown check.
        link_url -> Text,
        action_type -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Permanent record that a user earned an action on a URL.
    completed_url_actions (user_id, link_url, action_type) {
        user_id -> Int8,
        link_url -> Text,
        action_type -> Text,
        completed_at -> Timestamptz,
    }
}

diesel::table! {
    complaints (id) {
        id -> Int8,
        complainant_id -> Int8,
        accused_id -> Int8,
        link_id -> Int8,
        category -> Text,
        status -> Text,
        resolved_by -> Nullable<Int8>,
        admin_note -> Nullable<Text>,
        created_at -> Timestamptz,
        resolved_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Ban history; rows are stamped as lifted, never deleted.
    bans (id) {
        id -> Int8,
        user_id -> Int8,
        reason -> Text,
        expires_at -> Nullable<Timestamptz>,
        issued_by -> Nullable<Int8>,
        created_at -> Timestamptz,
        lifted_at -> Nullable<Timestamptz>,
        lifted_by -> Nullable<Int8>,
    }
}

diesel::table! {
    unban_requests (id) {
        id -> Int8,
        user_id -> Int8,
        status -> Text,
        created_at -> Timestamptz,
        decided_by -> Nullable<Int8>,
        decided_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    referrals (referred_id) {
        referred_id -> Int8,
        referrer_id -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    referral_bonuses (id) {
        id -> Int8,
        referrer_id -> Int8,
        referred_id -> Int8,
        amount -> Int8,
        cause -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    purchases (id) {
        id -> Int8,
        user_id -> Int8,
        amount -> Int8,
        cost -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(links -> users (owner_id));
diesel::joinable!(action_requirements -> links (link_id));
diesel::joinable!(action_transactions -> links (link_id));
diesel::joinable!(action_transactions -> users (user_id));
diesel::joinable!(complaints -> links (link_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    links,
    action_requirements,
    action_transactions,
    completed_url_actions,
    complaints,
    bans,
    unban_requests,
    referrals,
    referral_bonuses,
    purchases,
);
