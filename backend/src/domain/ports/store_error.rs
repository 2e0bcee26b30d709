//! Error type shared by every ledger store port.
//!
//! All store ports are backed by one relational schema and one transaction
//! boundary, so they share a single error vocabulary.

use super::define_port_error;

define_port_error! {
    /// Failures raised by ledger store adapters.
    pub enum LedgerStoreError {
        /// Store connection could not be established.
        Connection { message: String } => "ledger store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "ledger store query failed: {message}",
        /// A uniqueness or reference constraint was violated outside the
        /// normal check path, which points at a race or a caller bug.
        Integrity { message: String } => "ledger store integrity violation: {message}",
    }
}
