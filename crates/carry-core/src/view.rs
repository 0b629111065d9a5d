//! Per-user projection of an order.

use crate::error::WorkflowError;
use carry_types::{Listing, Order, OrderAction, OrderView, Party, UserId};

/// The role `actor` holds on `order`, if any.
///
/// The buyer is always the listing owner; it is never stored on the order.
pub fn role_of(actor: &UserId, order: &Order, listing: &Listing) -> Option<Party> {
	if &order.carrier_id == actor {
		Some(Party::Carrier)
	} else if listing.is_owned_by(actor) {
		Some(Party::Buyer)
	} else {
		None
	}
}

/// Builds what `actor` sees of `order`.
///
/// Only the buyer and the carrier may view an order.
pub fn project(order: Order, listing: Listing, actor: &UserId) -> Result<OrderView, WorkflowError> {
	let role = role_of(actor, &order, &listing).ok_or_else(|| {
		WorkflowError::Unauthorized(format!(
			"user {} is not a party to order {}",
			actor, order.id
		))
	})?;

	let next_action = match order.status.on_move() {
		Some(party) if party == role => OrderAction::from_status(order.status),
		_ => None,
	};

	Ok(OrderView {
		status_label: order.status.label().to_string(),
		progress_step: order.status.step(),
		user_is_buyer: role == Party::Buyer,
		user_is_carrier: role == Party::Carrier,
		next_action,
		order,
		listing,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use carry_types::{ListingId, ListingStatus, OrderId, OrderStatus};
	use serde_json::json;

	fn pair(status: OrderStatus) -> (Order, Listing) {
		let listing = Listing {
			id: ListingId::new("l1"),
			owner_id: UserId::new("buyer"),
			details: json!({"item": "tea"}),
			status: ListingStatus::Accepted,
			created_at: 1,
		};
		let mut order = Order::accepted(
			OrderId::new("o1"),
			listing.id.clone(),
			UserId::new("carrier"),
			2,
		);
		order.status = status;
		(order, listing)
	}

	#[test]
	fn test_next_action_alternates() {
		let buyer = UserId::new("buyer");
		let carrier = UserId::new("carrier");

		let (order, listing) = pair(OrderStatus::Accepted);
		let view = project(order.clone(), listing.clone(), &carrier).unwrap();
		assert!(view.user_is_carrier && !view.user_is_buyer);
		assert_eq!(view.next_action, Some(OrderAction::SubmitShippingAddress));
		assert_eq!(view.status_label, "Demand accepted");
		assert_eq!(view.progress_step, 1);

		let view = project(order, listing, &buyer).unwrap();
		assert!(view.user_is_buyer);
		assert_eq!(view.next_action, None);

		let (order, listing) = pair(OrderStatus::AwaitingPickup);
		let view = project(order, listing, &buyer).unwrap();
		assert_eq!(view.next_action, Some(OrderAction::CompleteOrder));
		assert_eq!(view.progress_step, 4);
	}

	#[test]
	fn test_terminal_order_has_no_action() {
		let (order, listing) = pair(OrderStatus::Received);
		for actor in ["buyer", "carrier"] {
			let view = project(order.clone(), listing.clone(), &UserId::new(actor)).unwrap();
			assert_eq!(view.next_action, None);
			assert_eq!(view.status_label, "Transaction complete");
		}
	}

	#[test]
	fn test_stranger_cannot_view() {
		let (order, listing) = pair(OrderStatus::Ordered);
		let result = project(order, listing, &UserId::new("stranger"));
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));
	}
}
