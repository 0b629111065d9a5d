//! Listing types.
//!
//! A listing is a transport demand posted by a buyer. Its descriptive payload
//! (item, destination, weight, fee, contact details) is configuration-driven
//! and opaque to the fulfillment workflow; only the owner and the open flag
//! matter to it.

use crate::{ListingId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transport demand posted by its owner (the buyer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
	/// Unique identifier for this listing.
	pub id: ListingId,
	/// The user who posted the listing.
	pub owner_id: UserId,
	/// Descriptive payload in JSON format.
	pub details: serde_json::Value,
	/// Whether the listing is still available for acceptance.
	pub status: ListingStatus,
	/// Timestamp when this listing was posted.
	pub created_at: u64,
}

impl Listing {
	pub fn is_open(&self) -> bool {
		self.status == ListingStatus::Open
	}

	pub fn is_owned_by(&self, user_id: &UserId) -> bool {
		&self.owner_id == user_id
	}
}

/// Availability of a listing.
///
/// A listing moves from `Open` to `Accepted` exactly once, when an order is
/// created for it, and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
	Open,
	Accepted,
}

impl fmt::Display for ListingStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ListingStatus::Open => write!(f, "open"),
			ListingStatus::Accepted => write!(f, "accepted"),
		}
	}
}
