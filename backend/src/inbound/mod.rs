//! Inbound adapters that sit between the conversational front-end and the
//! domain services.
//!
//! The front-end owns message parsing and rendering; before dispatching any
//! user action it asks the [`access_gate`] whether the sender may act.

pub mod access_gate;
