//! Strongly typed identifiers for ledger entities.
//!
//! Every row in the ledger store is keyed by a database sequence value. The
//! newtypes keep a `LinkId` from being passed where a `UserId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw store identifier.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Raw store identifier.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Internal user identifier.
    UserId
);
define_id!(
    /// Account identifier assigned by the conversational front-end.
    ExternalUserId
);
define_id!(
    /// Submitted link ("project") identifier.
    LinkId
);
define_id!(
    /// Per-link action requirement row identifier.
    RequirementId
);
define_id!(
    /// Action transaction identifier.
    TransactionId
);
define_id!(
    /// Complaint identifier.
    ComplaintId
);
define_id!(
    /// Ban row identifier.
    BanId
);
define_id!(
    /// Unban request identifier.
    UnbanRequestId
);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn ids_round_trip_through_raw_values() {
        let id = LinkId::new(42);
        assert_eq!(id.get(), 42);
        assert_eq!(i64::from(id), 42);
        assert_eq!(LinkId::from(42), id);
    }

    #[rstest]
    fn ids_serialise_transparently() {
        let value = serde_json::to_value(UserId::new(7)).expect("serialise id");
        assert_eq!(value, serde_json::json!(7));
    }
}
