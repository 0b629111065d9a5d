//! Event types emitted by the fulfillment workflow.
//!
//! Every successful transition produces exactly one event. Events are handed
//! to the configured notification sink and, when enabled, fanned out over the
//! in-process event bus so other components can react to order progress.

use crate::{ListingId, Order, OrderId, OrderStatus, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of handoff that just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
	/// A carrier accepted a listing and an order was created.
	ListingAccepted,
	/// The carrier submitted a shipping address.
	AddressSubmitted,
	/// The buyer submitted a tracking number.
	TrackingSubmitted,
	/// The carrier posted arrival information.
	ArrivalPosted,
	/// The buyer confirmed receipt and rated the carrier.
	OrderCompleted,
}

impl EventKind {
	/// The event produced by entering `status`.
	pub fn entering(status: OrderStatus) -> Self {
		match status {
			OrderStatus::Accepted => EventKind::ListingAccepted,
			OrderStatus::AddressSubmitted => EventKind::AddressSubmitted,
			OrderStatus::Ordered => EventKind::TrackingSubmitted,
			OrderStatus::AwaitingPickup => EventKind::ArrivalPosted,
			OrderStatus::Received => EventKind::OrderCompleted,
		}
	}
}

impl fmt::Display for EventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			EventKind::ListingAccepted => "listing_accepted",
			EventKind::AddressSubmitted => "address_submitted",
			EventKind::TrackingSubmitted => "tracking_submitted",
			EventKind::ArrivalPosted => "arrival_posted",
			EventKind::OrderCompleted => "order_completed",
		};
		f.write_str(name)
	}
}

/// A completed workflow transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
	pub kind: EventKind,
	pub order_id: OrderId,
	pub listing_id: ListingId,
	/// The user whose request caused the transition.
	pub actor_id: UserId,
	/// The order status after the transition.
	pub status: OrderStatus,
	pub occurred_at: u64,
}

impl WorkflowEvent {
	/// Builds the event for an order that just entered its current status.
	pub fn for_order(order: &Order, actor_id: UserId) -> Self {
		Self {
			kind: EventKind::entering(order.status),
			order_id: order.id.clone(),
			listing_id: order.listing_id.clone(),
			actor_id,
			status: order.status,
			occurred_at: order.updated_at,
		}
	}

	/// One-line description for the counterparty.
	pub fn describe(&self) -> String {
		match self.kind {
			EventKind::ListingAccepted => format!(
				"Carrier {} accepted listing {}",
				self.actor_id, self.listing_id
			),
			EventKind::AddressSubmitted => format!(
				"Carrier {} submitted a shipping address for listing {}",
				self.actor_id, self.listing_id
			),
			EventKind::TrackingSubmitted => format!(
				"Buyer {} posted a tracking number for order {}",
				self.actor_id, self.order_id
			),
			EventKind::ArrivalPosted => format!(
				"Carrier {} posted arrival information for order {}",
				self.actor_id, self.order_id
			),
			EventKind::OrderCompleted => format!(
				"Buyer {} completed order {} and rated the carrier",
				self.actor_id, self.order_id
			),
		}
	}
}
