//! Identifier newtypes.
//!
//! Users, listings and orders are all keyed by strings in storage. Wrapping
//! each in its own type keeps an order id from ever being passed where a
//! listing id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(String);

		impl $name {
			/// Wraps an existing identifier.
			pub fn new(id: impl Into<String>) -> Self {
				Self(id.into())
			}

			/// Generates a fresh random identifier.
			pub fn generate() -> Self {
				Self(uuid::Uuid::new_v4().to_string())
			}

			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}

		impl From<&str> for $name {
			fn from(id: &str) -> Self {
				Self(id.to_string())
			}
		}

		impl From<String> for $name {
			fn from(id: String) -> Self {
				Self(id)
			}
		}
	};
}

define_id!(
	/// Identifier of a marketplace account.
	UserId
);
define_id!(
	/// Identifier of a listing (transport demand).
	ListingId
);
define_id!(
	/// Identifier of an order.
	OrderId
);
