//! Order ledger.
//!
//! Orders move through `accepted -> address_submitted -> ordered ->
//! awaiting_pickup -> received`. The ledger does not know who is acting; it
//! only enforces that each write starts from the status the caller expected
//! and moves exactly one step forward.

use crate::error::WorkflowError;
use crate::listings::ListingService;
use carry_storage::{StorageService, Versioned, WriteBatch};
use carry_types::{
	current_timestamp, ListingId, Order, OrderAction, OrderId, OrderStatus, StorageKey, UserId,
};
use std::sync::Arc;

/// Fields written by a single transition.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderUpdate {
	ShippingAddress(String),
	TrackingNumber(String),
	Arrival {
		estimated_arrival_date: String,
		flight_number: Option<String>,
		pickup_location: Option<String>,
	},
	Rating(u8),
}

impl OrderUpdate {
	/// The transition this update belongs to.
	pub fn action(&self) -> OrderAction {
		match self {
			OrderUpdate::ShippingAddress(_) => OrderAction::SubmitShippingAddress,
			OrderUpdate::TrackingNumber(_) => OrderAction::SubmitTrackingNumber,
			OrderUpdate::Arrival { .. } => OrderAction::SubmitArrivalInfo,
			OrderUpdate::Rating(_) => OrderAction::CompleteOrder,
		}
	}

	fn apply(self, order: &mut Order) {
		match self {
			OrderUpdate::ShippingAddress(address) => order.shipping_address = Some(address),
			OrderUpdate::TrackingNumber(tracking) => order.tracking_number = Some(tracking),
			OrderUpdate::Arrival {
				estimated_arrival_date,
				flight_number,
				pickup_location,
			} => {
				order.estimated_arrival_date = Some(estimated_arrival_date);
				order.flight_number = flight_number;
				order.pickup_location = pickup_location;
			},
			OrderUpdate::Rating(rating) => order.rating = Some(rating),
		}
	}
}

pub struct OrderLedger {
	storage: Arc<StorageService>,
	listings: Arc<ListingService>,
}

impl OrderLedger {
	pub fn new(storage: Arc<StorageService>, listings: Arc<ListingService>) -> Self {
		Self { storage, listings }
	}

	/// Creates the order for `listing_id` with `carrier_id` as carrier.
	///
	/// The listing flip to accepted, the order record and the listing to order
	/// index are committed together, guarded on the listing bytes that were
	/// read and on the order keys being absent.
	pub async fn create(
		&self,
		listing_id: &ListingId,
		carrier_id: &UserId,
	) -> Result<Order, WorkflowError> {
		let listing = self.listings.get_versioned(listing_id).await?;
		if listing.value.is_owned_by(carrier_id) {
			return Err(WorkflowError::Conflict(format!(
				"listing {} cannot be accepted by its owner",
				listing_id
			)));
		}
		if !listing.value.is_open() {
			return Err(WorkflowError::Conflict(format!(
				"listing {} is already {}",
				listing_id, listing.value.status
			)));
		}

		let order = Order::accepted(
			OrderId::generate(),
			listing_id.clone(),
			carrier_id.clone(),
			current_timestamp(),
		);

		let mut batch = WriteBatch::new();
		self.listings.stage_accept(&mut batch, &listing)?;
		batch.insert(StorageKey::Orders.as_str(), order.id.as_str(), &order)?;
		batch.insert(
			StorageKey::OrderByListing.as_str(),
			listing_id.as_str(),
			&order.id,
		)?;

		self.storage
			.commit(batch)
			.await
			.map_err(WorkflowError::commit(format!(
				"listing {} was accepted concurrently",
				listing_id
			)))?;

		Ok(order)
	}

	pub async fn get(&self, order_id: &OrderId) -> Result<Order, WorkflowError> {
		self.get_versioned(order_id).await.map(Versioned::into_value)
	}

	async fn get_versioned(&self, order_id: &OrderId) -> Result<Versioned<Order>, WorkflowError> {
		self.storage
			.retrieve_versioned(StorageKey::Orders.as_str(), order_id.as_str())
			.await
			.map_err(WorkflowError::lookup("order", order_id))
	}

	/// Returns the order created from `listing_id`.
	pub async fn get_by_listing(&self, listing_id: &ListingId) -> Result<Order, WorkflowError> {
		let order_id: OrderId = self
			.storage
			.retrieve(StorageKey::OrderByListing.as_str(), listing_id.as_str())
			.await
			.map_err(WorkflowError::lookup("order for listing", listing_id))?;
		self.get(&order_id).await
	}

	/// Moves an order from `expected` to `next`, applying `update`.
	///
	/// Fails with `Conflict` when the stored status is not `expected` or when
	/// another writer changes the order between the read and the commit. On
	/// failure the stored record is left untouched.
	pub async fn advance(
		&self,
		order_id: &OrderId,
		expected: OrderStatus,
		next: OrderStatus,
		update: OrderUpdate,
	) -> Result<Order, WorkflowError> {
		let action = update.action();
		if expected.next() != Some(next)
			|| action.required_status() != expected
			|| action.target_status() != next
		{
			return Err(WorkflowError::Conflict(format!(
				"{} cannot move an order from {} to {}",
				action, expected, next
			)));
		}

		let current = self.get_versioned(order_id).await?;
		if current.value.status != expected {
			return Err(WorkflowError::Conflict(format!(
				"order {} is {}, expected {}",
				order_id, current.value.status, expected
			)));
		}

		let mut order = current.value.clone();
		update.apply(&mut order);
		order.status = next;
		order.updated_at = current_timestamp().max(order.created_at);

		let mut batch = WriteBatch::new();
		batch.replace(StorageKey::Orders.as_str(), order_id.as_str(), &current, &order)?;
		self.storage
			.commit(batch)
			.await
			.map_err(WorkflowError::commit(format!(
				"order {} was updated concurrently",
				order_id
			)))?;

		Ok(order)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use carry_storage::implementations::memory::MemoryStorage;
	use carry_types::ListingStatus;
	use futures::future::join_all;
	use serde_json::json;

	struct Fixture {
		storage: Arc<StorageService>,
		listings: Arc<ListingService>,
		ledger: Arc<OrderLedger>,
	}

	fn fixture() -> Fixture {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let listings = Arc::new(ListingService::new(storage.clone()));
		let ledger = Arc::new(OrderLedger::new(storage.clone(), listings.clone()));
		Fixture {
			storage,
			listings,
			ledger,
		}
	}

	async fn open_listing(fx: &Fixture) -> ListingId {
		fx.listings
			.publish(&UserId::new("buyer"), json!({"item": "camera"}))
			.await
			.unwrap()
			.id
	}

	async fn raw_order(fx: &Fixture, id: &OrderId) -> Vec<u8> {
		fx.storage
			.retrieve_versioned::<Order>(StorageKey::Orders.as_str(), id.as_str())
			.await
			.unwrap()
			.bytes()
			.to_vec()
	}

	#[tokio::test]
	async fn test_create_flips_listing_and_indexes_order() {
		let fx = fixture();
		let listing_id = open_listing(&fx).await;

		let order = fx
			.ledger
			.create(&listing_id, &UserId::new("carrier"))
			.await
			.unwrap();

		assert_eq!(order.status, OrderStatus::Accepted);
		assert_eq!(order.created_at, order.updated_at);
		let listing = fx.listings.get(&listing_id).await.unwrap();
		assert_eq!(listing.status, ListingStatus::Accepted);
		let by_listing = fx.ledger.get_by_listing(&listing_id).await.unwrap();
		assert_eq!(by_listing.id, order.id);
	}

	#[tokio::test]
	async fn test_create_rejects_owner_and_missing_listing() {
		let fx = fixture();
		let listing_id = open_listing(&fx).await;

		let result = fx.ledger.create(&listing_id, &UserId::new("buyer")).await;
		assert!(matches!(result, Err(WorkflowError::Conflict(_))));
		assert!(fx.listings.is_open(&listing_id).await.unwrap());

		let result = fx
			.ledger
			.create(&ListingId::new("missing"), &UserId::new("carrier"))
			.await;
		assert!(matches!(result, Err(WorkflowError::NotFound { kind: "listing", .. })));
	}

	#[tokio::test]
	async fn test_concurrent_create_single_order() {
		let fx = fixture();
		let listing_id = open_listing(&fx).await;

		let attempts = (0..8).map(|i| {
			let ledger = fx.ledger.clone();
			let listing_id = listing_id.clone();
			async move {
				ledger
					.create(&listing_id, &UserId::new(format!("carrier-{}", i)))
					.await
			}
		});
		let results = join_all(attempts).await;

		let winners: Vec<&Order> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
		assert_eq!(winners.len(), 1);
		assert!(results
			.iter()
			.filter_map(|r| r.as_ref().err())
			.all(|e| matches!(e, WorkflowError::Conflict(_))));
		let stored = fx.ledger.get_by_listing(&listing_id).await.unwrap();
		assert_eq!(stored.id, winners[0].id);
	}

	#[tokio::test]
	async fn test_advance_wrong_predecessor_leaves_record_unchanged() {
		let fx = fixture();
		let listing_id = open_listing(&fx).await;
		let order = fx
			.ledger
			.create(&listing_id, &UserId::new("carrier"))
			.await
			.unwrap();
		let before = raw_order(&fx, &order.id).await;

		let result = fx
			.ledger
			.advance(
				&order.id,
				OrderStatus::AddressSubmitted,
				OrderStatus::Ordered,
				OrderUpdate::TrackingNumber("SF123".into()),
			)
			.await;

		assert!(matches!(result, Err(WorkflowError::Conflict(_))));
		assert_eq!(raw_order(&fx, &order.id).await, before);
	}

	#[tokio::test]
	async fn test_advance_rejects_skips_and_mismatched_updates() {
		let fx = fixture();
		let listing_id = open_listing(&fx).await;
		let order = fx
			.ledger
			.create(&listing_id, &UserId::new("carrier"))
			.await
			.unwrap();

		let skip = fx
			.ledger
			.advance(
				&order.id,
				OrderStatus::Accepted,
				OrderStatus::Ordered,
				OrderUpdate::ShippingAddress("addr".into()),
			)
			.await;
		assert!(matches!(skip, Err(WorkflowError::Conflict(_))));

		let mismatched = fx
			.ledger
			.advance(
				&order.id,
				OrderStatus::Accepted,
				OrderStatus::AddressSubmitted,
				OrderUpdate::Rating(5),
			)
			.await;
		assert!(matches!(mismatched, Err(WorkflowError::Conflict(_))));
		assert_eq!(
			fx.ledger.get(&order.id).await.unwrap().status,
			OrderStatus::Accepted
		);
	}

	#[tokio::test]
	async fn test_concurrent_advance_single_winner() {
		let fx = fixture();
		let listing_id = open_listing(&fx).await;
		let order = fx
			.ledger
			.create(&listing_id, &UserId::new("carrier"))
			.await
			.unwrap();

		let attempts = (0..8).map(|i| {
			let ledger = fx.ledger.clone();
			let order_id = order.id.clone();
			async move {
				ledger
					.advance(
						&order_id,
						OrderStatus::Accepted,
						OrderStatus::AddressSubmitted,
						OrderUpdate::ShippingAddress(format!("address {}", i)),
					)
					.await
			}
		});
		let results = join_all(attempts).await;

		assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
		let stored = fx.ledger.get(&order.id).await.unwrap();
		assert_eq!(stored.status, OrderStatus::AddressSubmitted);
	}

	#[tokio::test]
	async fn test_arrival_update_sets_optional_fields() {
		let mut order = Order::accepted(
			OrderId::new("o1"),
			ListingId::new("l1"),
			UserId::new("c1"),
			10,
		);
		OrderUpdate::Arrival {
			estimated_arrival_date: "2024-06-01".into(),
			flight_number: None,
			pickup_location: Some("Terminal 2".into()),
		}
		.apply(&mut order);

		assert_eq!(order.estimated_arrival_date.as_deref(), Some("2024-06-01"));
		assert!(order.flight_number.is_none());
		assert_eq!(order.pickup_location.as_deref(), Some("Terminal 2"));
	}

	#[tokio::test]
	async fn test_unknown_order() {
		let fx = fixture();
		let result = fx.ledger.get(&OrderId::new("nope")).await;
		assert!(matches!(result, Err(WorkflowError::NotFound { kind: "order", .. })));

		let listing_id = open_listing(&fx).await;
		let result = fx.ledger.get_by_listing(&listing_id).await;
		assert!(matches!(result, Err(WorkflowError::NotFound { .. })));
	}
}
