//! Storage-related types for the marketplace.

use std::str::FromStr;

/// Storage namespaces for the persisted collections.
///
/// Replaces string literals in storage calls with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Listing records, keyed by listing id
	Listings,
	/// Order records, keyed by order id
	Orders,
	/// Order id for each accepted listing, keyed by listing id
	OrderByListing,
	/// User records, keyed by user id
	Users,
	/// User id for each username
	UserByName,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Listings => "listings",
			StorageKey::Orders => "orders",
			StorageKey::OrderByListing => "order_by_listing",
			StorageKey::Users => "users",
			StorageKey::UserByName => "user_by_name",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Listings,
			Self::Orders,
			Self::OrderByListing,
			Self::Users,
			Self::UserByName,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		StorageKey::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
