//! Common types module for the carry marketplace.
//!
//! This module defines the data model shared by every marketplace component:
//! identifiers, listings, users, orders and their fulfillment status, workflow
//! events, storage namespaces and the HTTP API surface.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Event types emitted on every successful workflow transition.
pub mod events;
/// Strongly typed identifiers for users, listings and orders.
pub mod ids;
/// Listing (transport demand) types.
pub mod listing;
/// Order fulfillment types including the status sequence.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage namespaces for persisted records.
pub mod storage;
/// Marketplace account types.
pub mod user;
/// Utility functions for timestamps and display formatting.
pub mod utils;
/// Configuration validation types for implementation-specific TOML tables.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use events::*;
pub use ids::{ListingId, OrderId, UserId};
pub use listing::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use user::*;
pub use utils::{current_timestamp, truncate_id};
pub use validation::*;
