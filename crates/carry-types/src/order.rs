//! Order fulfillment types for the marketplace.
//!
//! This module defines the order record, the fixed status sequence it moves
//! through, the party that must act in each status, and the read-only view
//! handed to the presentation layer.

use crate::{Listing, ListingId, OrderId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The engagement between a buyer and a carrier for one listing.
///
/// The buyer is never stored here; it is always the owner of `listing_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier for this order.
	pub id: OrderId,
	/// The accepted listing this order fulfills.
	pub listing_id: ListingId,
	/// The user who accepted the listing and transports the goods.
	pub carrier_id: UserId,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Where the buyer should ship the goods. Set at `address_submitted`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub shipping_address: Option<String>,
	/// Parcel tracking number. Set at `ordered`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tracking_number: Option<String>,
	/// Estimated arrival date. Set at `awaiting_pickup`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub estimated_arrival_date: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub flight_number: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub pickup_location: Option<String>,
	/// Carrier rating given by the buyer (1-5). Set at `received`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rating: Option<u8>,
	/// Timestamp when this order was created.
	pub created_at: u64,
	/// Timestamp when this order was last updated.
	pub updated_at: u64,
}

impl Order {
	/// Creates a freshly accepted order with both timestamps set to `now`.
	pub fn accepted(id: OrderId, listing_id: ListingId, carrier_id: UserId, now: u64) -> Self {
		Self {
			id,
			listing_id,
			carrier_id,
			status: OrderStatus::Accepted,
			shipping_address: None,
			tracking_number: None,
			estimated_arrival_date: None,
			flight_number: None,
			pickup_location: None,
			rating: None,
			created_at: now,
			updated_at: now,
		}
	}
}

/// Status of an order, in fixed forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	/// The carrier accepted the listing.
	Accepted,
	/// The carrier gave the buyer a shipping address.
	AddressSubmitted,
	/// The buyer ordered the goods and shipped them to the carrier.
	Ordered,
	/// The carrier arrived and the goods await pickup.
	AwaitingPickup,
	/// The buyer received the goods and rated the carrier. Terminal.
	Received,
}

impl OrderStatus {
	/// Every status, in sequence.
	pub const ALL: [OrderStatus; 5] = [
		OrderStatus::Accepted,
		OrderStatus::AddressSubmitted,
		OrderStatus::Ordered,
		OrderStatus::AwaitingPickup,
		OrderStatus::Received,
	];

	/// The only status this one may advance to.
	pub fn next(self) -> Option<OrderStatus> {
		match self {
			OrderStatus::Accepted => Some(OrderStatus::AddressSubmitted),
			OrderStatus::AddressSubmitted => Some(OrderStatus::Ordered),
			OrderStatus::Ordered => Some(OrderStatus::AwaitingPickup),
			OrderStatus::AwaitingPickup => Some(OrderStatus::Received),
			OrderStatus::Received => None,
		}
	}

	/// The party allowed to trigger the outgoing transition.
	pub fn on_move(self) -> Option<Party> {
		match self {
			OrderStatus::Accepted => Some(Party::Carrier),
			OrderStatus::AddressSubmitted => Some(Party::Buyer),
			OrderStatus::Ordered => Some(Party::Carrier),
			OrderStatus::AwaitingPickup => Some(Party::Buyer),
			OrderStatus::Received => None,
		}
	}

	pub fn is_terminal(self) -> bool {
		self.next().is_none()
	}

	/// 1-based position in the sequence, for progress display.
	pub fn step(self) -> u8 {
		match self {
			OrderStatus::Accepted => 1,
			OrderStatus::AddressSubmitted => 2,
			OrderStatus::Ordered => 3,
			OrderStatus::AwaitingPickup => 4,
			OrderStatus::Received => 5,
		}
	}

	/// Human readable status text.
	pub fn label(self) -> &'static str {
		match self {
			OrderStatus::Accepted => "Demand accepted",
			OrderStatus::AddressSubmitted => "Shipping address confirmed",
			OrderStatus::Ordered => "Ordered and shipped",
			OrderStatus::AwaitingPickup => "Arrived, awaiting pickup",
			OrderStatus::Received => "Transaction complete",
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			OrderStatus::Accepted => "accepted",
			OrderStatus::AddressSubmitted => "address_submitted",
			OrderStatus::Ordered => "ordered",
			OrderStatus::AwaitingPickup => "awaiting_pickup",
			OrderStatus::Received => "received",
		}
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A participant role on a single order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
	/// The listing owner; receives the goods.
	Buyer,
	/// The user who accepted the listing; transports the goods.
	Carrier,
}

impl fmt::Display for Party {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Party::Buyer => write!(f, "buyer"),
			Party::Carrier => write!(f, "carrier"),
		}
	}
}

/// A write transition on an existing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
	SubmitShippingAddress,
	SubmitTrackingNumber,
	SubmitArrivalInfo,
	CompleteOrder,
}

impl OrderAction {
	/// The action that advances an order out of `status`, if any.
	pub fn from_status(status: OrderStatus) -> Option<Self> {
		match status {
			OrderStatus::Accepted => Some(OrderAction::SubmitShippingAddress),
			OrderStatus::AddressSubmitted => Some(OrderAction::SubmitTrackingNumber),
			OrderStatus::Ordered => Some(OrderAction::SubmitArrivalInfo),
			OrderStatus::AwaitingPickup => Some(OrderAction::CompleteOrder),
			OrderStatus::Received => None,
		}
	}

	/// The status the order must be in for this action.
	pub fn required_status(self) -> OrderStatus {
		match self {
			OrderAction::SubmitShippingAddress => OrderStatus::Accepted,
			OrderAction::SubmitTrackingNumber => OrderStatus::AddressSubmitted,
			OrderAction::SubmitArrivalInfo => OrderStatus::Ordered,
			OrderAction::CompleteOrder => OrderStatus::AwaitingPickup,
		}
	}

	/// The status the order ends up in after this action.
	pub fn target_status(self) -> OrderStatus {
		match self {
			OrderAction::SubmitShippingAddress => OrderStatus::AddressSubmitted,
			OrderAction::SubmitTrackingNumber => OrderStatus::Ordered,
			OrderAction::SubmitArrivalInfo => OrderStatus::AwaitingPickup,
			OrderAction::CompleteOrder => OrderStatus::Received,
		}
	}

	/// The party allowed to perform this action.
	pub fn party(self) -> Party {
		match self {
			OrderAction::SubmitShippingAddress | OrderAction::SubmitArrivalInfo => Party::Carrier,
			OrderAction::SubmitTrackingNumber | OrderAction::CompleteOrder => Party::Buyer,
		}
	}
}

impl fmt::Display for OrderAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			OrderAction::SubmitShippingAddress => "submit_shipping_address",
			OrderAction::SubmitTrackingNumber => "submit_tracking_number",
			OrderAction::SubmitArrivalInfo => "submit_arrival_info",
			OrderAction::CompleteOrder => "complete_order",
		};
		f.write_str(name)
	}
}

/// What a given user sees of an order, and what they may do next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
	pub order: Order,
	pub listing: Listing,
	#[serde(rename = "statusLabel")]
	pub status_label: String,
	/// 1-based progress step (1..=5).
	#[serde(rename = "progressStep")]
	pub progress_step: u8,
	#[serde(rename = "userIsBuyer")]
	pub user_is_buyer: bool,
	#[serde(rename = "userIsCarrier")]
	pub user_is_carrier: bool,
	/// The transition the viewing user may perform right now.
	#[serde(rename = "nextAction")]
	pub next_action: Option<OrderAction>,
}
