//! Marketplace account types.

use crate::UserId;
use serde::{Deserialize, Serialize};

/// A registered marketplace account.
///
/// Roles on an order (buyer or carrier) are derived per order, never stored
/// on the account; the same user may be a buyer on one order and a carrier
/// on another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	/// Unique display name.
	pub username: String,
	/// Administrators may remove other users' open listings.
	#[serde(default)]
	pub is_admin: bool,
	pub created_at: u64,
}
