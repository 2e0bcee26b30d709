//! Translation of pool and Diesel failures into [`LedgerStoreError`].

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::LedgerStoreError;

use super::pool::PoolError;

/// Map pool checkout and build failures to connection errors.
pub(crate) fn map_pool_error(error: PoolError) -> LedgerStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            LedgerStoreError::connection(message)
        }
    }
}

/// Map Diesel errors, logging the database detail at debug level.
///
/// Constraint violations surface as integrity errors: every ledger write is
/// checked before it is issued, so a violated constraint means a concurrent
/// writer won a race or a caller broke an invariant.
pub(crate) fn map_diesel_error(error: DieselError) -> LedgerStoreError {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = info.constraint_name(),
                "diesel operation failed"
            );
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => LedgerStoreError::query("record not found"),
        DieselError::QueryBuilderError(_) => LedgerStoreError::query("database query error"),
        DieselError::DatabaseError(kind, info) => match kind {
            DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::CheckViolation
            | DatabaseErrorKind::NotNullViolation => LedgerStoreError::integrity(
                info.constraint_name()
                    .map_or_else(|| info.message().to_owned(), str::to_owned),
            ),
            DatabaseErrorKind::ClosedConnection => {
                LedgerStoreError::connection("database connection error")
            }
            DatabaseErrorKind::SerializationFailure => {
                LedgerStoreError::query("concurrent update conflict")
            }
            _ => LedgerStoreError::query("database error"),
        },
        _ => LedgerStoreError::query("database error"),
    }
}

impl From<DieselError> for LedgerStoreError {
    fn from(error: DieselError) -> Self {
        map_diesel_error(error)
    }
}
