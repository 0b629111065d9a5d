//! Persistent order state.
//!
//! The ledger is the only place orders are created or modified. Every write
//! is a guarded commit, so concurrent transitions on the same order or
//! concurrent acceptances of the same listing resolve to a single winner.

pub mod ledger;

pub use ledger::{OrderLedger, OrderUpdate};
