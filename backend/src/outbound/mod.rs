//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL-backed stores using Diesel ORM
//! - **memory**: an in-process store with identical semantics, for tests
//!   and throwaway ledgers
//! - **notify**: notice delivery and broadcast pacing
//!
//! Adapters translate between domain types and infrastructure
//! representations. Economic rules stay in the domain; adapters only enforce
//! the atomicity those rules rely on.

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod notify;
pub mod persistence;
