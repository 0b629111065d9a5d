//! Workflow engine for the carry-goods marketplace.
//!
//! The engine is the single entry point for every order operation. Each
//! transition runs the same checks in the same order: the order and its
//! listing must exist, the actor must hold the role the transition requires,
//! the order must be in the transition's predecessor status, and only then is
//! the input validated. The write itself is a compare-and-set on the stored
//! order, and a successful write is followed by exactly one notification.

pub mod event_bus;
mod input;

use crate::error::WorkflowError;
use crate::listings::ListingService;
use crate::notifications::{NotificationService, NotificationSink};
use crate::state::{OrderLedger, OrderUpdate};
use crate::users::{StorageUserDirectory, UserDirectory};
use crate::view::{project, role_of};
use carry_config::Config;
use carry_storage::StorageService;
use carry_types::{
	truncate_id, Listing, ListingId, Order, OrderAction, OrderId, OrderView, User, UserId,
	WorkflowEvent,
};
use std::sync::Arc;
use tracing::instrument;

use self::event_bus::EventBus;

/// Coordinates the order ledger, listings, users and notifications.
#[derive(Clone)]
pub struct WorkflowEngine {
	config: Config,
	ledger: Arc<OrderLedger>,
	listings: Arc<ListingService>,
	users: Arc<dyn UserDirectory>,
	notifications: Arc<NotificationService>,
	event_bus: EventBus,
}

impl WorkflowEngine {
	/// Creates an engine whose records all live in `storage`.
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		notifier: Box<dyn NotificationSink>,
		event_bus: EventBus,
	) -> Self {
		let listings = Arc::new(ListingService::new(storage.clone()));
		let ledger = Arc::new(OrderLedger::new(storage.clone(), listings.clone()));
		let users: Arc<dyn UserDirectory> = Arc::new(StorageUserDirectory::new(storage));

		Self {
			config,
			ledger,
			listings,
			users,
			notifications: Arc::new(NotificationService::new(notifier)),
			event_bus,
		}
	}

	/// Carrier `actor` accepts an open listing, creating its order.
	#[instrument(skip_all, fields(listing_id = %truncate_id(listing_id.as_str()), actor_id = %actor))]
	pub async fn accept_listing(
		&self,
		actor: &UserId,
		listing_id: &ListingId,
	) -> Result<Order, WorkflowError> {
		self.listings.get(listing_id).await?;
		self.require_user(actor).await?;

		let order = self.ledger.create(listing_id, actor).await?;
		tracing::info!(order_id = %order.id, "Listing accepted");
		self.notify(actor, &order);
		Ok(order)
	}

	/// Carrier gives the buyer the address to ship the goods to.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id.as_str()), actor_id = %actor))]
	pub async fn submit_shipping_address(
		&self,
		actor: &UserId,
		order_id: &OrderId,
		address: &str,
	) -> Result<Order, WorkflowError> {
		self.transition(actor, order_id, OrderAction::SubmitShippingAddress, || {
			Ok(OrderUpdate::ShippingAddress(input::required_text(
				"shipping_address",
				address,
			)?))
		})
		.await
	}

	/// Buyer reports the tracking number of the shipment to the carrier.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id.as_str()), actor_id = %actor))]
	pub async fn submit_tracking_number(
		&self,
		actor: &UserId,
		order_id: &OrderId,
		tracking_number: &str,
	) -> Result<Order, WorkflowError> {
		self.transition(actor, order_id, OrderAction::SubmitTrackingNumber, || {
			Ok(OrderUpdate::TrackingNumber(input::required_text(
				"tracking_number",
				tracking_number,
			)?))
		})
		.await
	}

	/// Carrier posts when and where the goods can be picked up.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id.as_str()), actor_id = %actor))]
	pub async fn submit_arrival_info(
		&self,
		actor: &UserId,
		order_id: &OrderId,
		estimated_arrival_date: &str,
		flight_number: Option<&str>,
		pickup_location: Option<&str>,
	) -> Result<Order, WorkflowError> {
		self.transition(actor, order_id, OrderAction::SubmitArrivalInfo, || {
			Ok(OrderUpdate::Arrival {
				estimated_arrival_date: input::required_text(
					"estimated_arrival_date",
					estimated_arrival_date,
				)?,
				flight_number: input::optional_text(flight_number),
				pickup_location: input::optional_text(pickup_location),
			})
		})
		.await
	}

	/// Buyer confirms receipt and rates the carrier from 1 to 5.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id.as_str()), actor_id = %actor))]
	pub async fn complete_order(
		&self,
		actor: &UserId,
		order_id: &OrderId,
		rating: i64,
	) -> Result<Order, WorkflowError> {
		self.transition(actor, order_id, OrderAction::CompleteOrder, || {
			Ok(OrderUpdate::Rating(input::rating(rating)?))
		})
		.await
	}

	pub async fn get_order_view(
		&self,
		actor: &UserId,
		order_id: &OrderId,
	) -> Result<OrderView, WorkflowError> {
		let order = self.ledger.get(order_id).await?;
		let listing = self.listings.get(&order.listing_id).await?;
		project(order, listing, actor)
	}

	/// Same as [`get_order_view`](Self::get_order_view), addressed by listing.
	pub async fn get_order_view_by_listing(
		&self,
		actor: &UserId,
		listing_id: &ListingId,
	) -> Result<OrderView, WorkflowError> {
		let listing = self.listings.get(listing_id).await?;
		let order = self.ledger.get_by_listing(listing_id).await?;
		project(order, listing, actor)
	}

	pub async fn register_user(&self, username: &str) -> Result<User, WorkflowError> {
		Ok(self.users.register(username, false).await?)
	}

	pub async fn publish_listing(
		&self,
		actor: &UserId,
		details: serde_json::Value,
	) -> Result<Listing, WorkflowError> {
		self.require_user(actor).await?;
		self.listings.publish(actor, details).await
	}

	pub async fn get_listing(&self, listing_id: &ListingId) -> Result<Listing, WorkflowError> {
		self.listings.get(listing_id).await
	}

	/// Deletes an open listing. Admins may delete listings they do not own.
	pub async fn delete_listing(
		&self,
		actor: &UserId,
		listing_id: &ListingId,
	) -> Result<(), WorkflowError> {
		self.listings.get(listing_id).await?;
		let user = self
			.users
			.get(actor)
			.await?
			.ok_or_else(|| WorkflowError::Unauthorized(format!("unknown user {}", actor)))?;
		self.listings
			.delete_if_open(actor, user.is_admin, listing_id)
			.await
	}

	pub fn users(&self) -> &Arc<dyn UserDirectory> {
		&self.users
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Runs one order transition through the shared check sequence.
	async fn transition<F>(
		&self,
		actor: &UserId,
		order_id: &OrderId,
		action: OrderAction,
		build_update: F,
	) -> Result<Order, WorkflowError>
	where
		F: FnOnce() -> Result<OrderUpdate, WorkflowError>,
	{
		let order = self.ledger.get(order_id).await?;
		let listing = self.listings.get(&order.listing_id).await?;

		if role_of(actor, &order, &listing) != Some(action.party()) {
			return Err(WorkflowError::Unauthorized(format!(
				"only the {} may {} on order {}",
				action.party(),
				action,
				order_id
			)));
		}
		if order.status != action.required_status() {
			return Err(WorkflowError::Conflict(format!(
				"order {} is {}, {} requires {}",
				order_id,
				order.status,
				action,
				action.required_status()
			)));
		}

		let update = build_update()?;
		let updated = self
			.ledger
			.advance(
				order_id,
				action.required_status(),
				action.target_status(),
				update,
			)
			.await?;

		tracing::info!(status = %updated.status, "Order advanced");
		self.notify(actor, &updated);
		Ok(updated)
	}

	async fn require_user(&self, actor: &UserId) -> Result<(), WorkflowError> {
		if self.users.exists(actor).await? {
			Ok(())
		} else {
			Err(WorkflowError::Unauthorized(format!("unknown user {}", actor)))
		}
	}

	fn notify(&self, actor: &UserId, order: &Order) {
		self.notifications
			.dispatch(&WorkflowEvent::for_order(order, actor.clone()));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::notifications::{implementations::bus::BusNotifier, MockNotificationSink, NotifyError};
	use carry_config::builders::config::ConfigBuilder;
	use carry_storage::implementations::{file::FileStorage, memory::MemoryStorage};
	use carry_storage::StorageInterface;
	use carry_types::{EventKind, ListingStatus, OrderStatus, StorageKey};
	use futures::future::join_all;
	use serde_json::json;

	struct Market {
		engine: WorkflowEngine,
		storage: Arc<StorageService>,
		buyer: UserId,
		carrier: UserId,
		stranger: UserId,
	}

	fn silent_sink() -> Box<dyn NotificationSink> {
		let mut sink = MockNotificationSink::new();
		sink.expect_notify().returning(|_| Ok(()));
		Box::new(sink)
	}

	async fn market_on(
		backend: Box<dyn StorageInterface>,
		sink: Box<dyn NotificationSink>,
	) -> Market {
		let storage = Arc::new(StorageService::new(backend));
		let engine = WorkflowEngine::new(
			ConfigBuilder::new().build(),
			storage.clone(),
			sink,
			EventBus::new(16),
		);
		let buyer = engine.register_user("buyer").await.unwrap().id;
		let carrier = engine.register_user("carrier").await.unwrap().id;
		let stranger = engine.register_user("stranger").await.unwrap().id;
		Market {
			engine,
			storage,
			buyer,
			carrier,
			stranger,
		}
	}

	async fn market() -> Market {
		market_on(Box::new(MemoryStorage::new()), silent_sink()).await
	}

	async fn listing(m: &Market) -> ListingId {
		m.engine
			.publish_listing(&m.buyer, json!({"item": "camera", "fee": 50}))
			.await
			.unwrap()
			.id
	}

	/// Drives a fresh order up to `status`.
	async fn order_at(m: &Market, status: OrderStatus) -> Order {
		let listing_id = listing(m).await;
		let mut order = m.engine.accept_listing(&m.carrier, &listing_id).await.unwrap();
		while order.status < status {
			order = match order.status {
				OrderStatus::Accepted => m
					.engine
					.submit_shipping_address(&m.carrier, &order.id, "1 Harbour Rd")
					.await
					.unwrap(),
				OrderStatus::AddressSubmitted => m
					.engine
					.submit_tracking_number(&m.buyer, &order.id, "SF1001")
					.await
					.unwrap(),
				OrderStatus::Ordered => m
					.engine
					.submit_arrival_info(&m.carrier, &order.id, "2024-06-01", None, None)
					.await
					.unwrap(),
				OrderStatus::AwaitingPickup => {
					m.engine.complete_order(&m.buyer, &order.id, 4).await.unwrap()
				},
				OrderStatus::Received => unreachable!(),
			};
		}
		order
	}

	async fn raw(m: &Market, order_id: &OrderId) -> Vec<u8> {
		m.storage
			.retrieve_versioned::<Order>(StorageKey::Orders.as_str(), order_id.as_str())
			.await
			.unwrap()
			.bytes()
			.to_vec()
	}

	#[tokio::test]
	async fn test_happy_path_to_received() {
		let m = market().await;
		let listing_id = listing(&m).await;

		let order = m.engine.accept_listing(&m.carrier, &listing_id).await.unwrap();
		assert_eq!(order.status, OrderStatus::Accepted);
		assert_eq!(order.carrier_id, m.carrier);
		assert_eq!(
			m.engine.get_listing(&listing_id).await.unwrap().status,
			ListingStatus::Accepted
		);

		let order = m
			.engine
			.submit_shipping_address(&m.carrier, &order.id, "  1 Harbour Rd ")
			.await
			.unwrap();
		assert_eq!(order.status, OrderStatus::AddressSubmitted);
		assert_eq!(order.shipping_address.as_deref(), Some("1 Harbour Rd"));

		let order = m
			.engine
			.submit_tracking_number(&m.buyer, &order.id, "SF1001")
			.await
			.unwrap();
		assert_eq!(order.status, OrderStatus::Ordered);

		let order = m
			.engine
			.submit_arrival_info(&m.carrier, &order.id, "2024-06-01", Some("CA981"), Some(" "))
			.await
			.unwrap();
		assert_eq!(order.status, OrderStatus::AwaitingPickup);
		assert_eq!(order.flight_number.as_deref(), Some("CA981"));
		assert!(order.pickup_location.is_none());

		let order = m.engine.complete_order(&m.buyer, &order.id, 5).await.unwrap();
		assert_eq!(order.status, OrderStatus::Received);
		assert_eq!(order.rating, Some(5));
		assert!(order.updated_at >= order.created_at);

		// The listing is gone for everyone else.
		let late = m.engine.accept_listing(&m.stranger, &listing_id).await;
		assert!(matches!(late, Err(WorkflowError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_owner_cannot_accept_own_listing() {
		let m = market().await;
		let listing_id = listing(&m).await;

		let result = m.engine.accept_listing(&m.buyer, &listing_id).await;
		assert!(matches!(result, Err(WorkflowError::Conflict(_))));
		assert_eq!(
			m.engine.get_listing(&listing_id).await.unwrap().status,
			ListingStatus::Open
		);
	}

	#[tokio::test]
	async fn test_accept_checks_existence_before_user() {
		let m = market().await;
		let ghost = UserId::new("ghost");

		let missing = m
			.engine
			.accept_listing(&ghost, &ListingId::new("missing"))
			.await;
		assert!(matches!(missing, Err(WorkflowError::NotFound { .. })));

		let listing_id = listing(&m).await;
		let unknown = m.engine.accept_listing(&ghost, &listing_id).await;
		assert!(matches!(unknown, Err(WorkflowError::Unauthorized(_))));
	}

	#[tokio::test]
	async fn test_concurrent_accept_creates_one_order() {
		let m = market().await;
		let listing_id = listing(&m).await;
		let mut carriers = Vec::new();
		for i in 0..6 {
			carriers.push(
				m.engine
					.register_user(&format!("carrier-{}", i))
					.await
					.unwrap()
					.id,
			);
		}

		let results = join_all(
			carriers
				.iter()
				.map(|carrier| m.engine.accept_listing(carrier, &listing_id)),
		)
		.await;

		assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
		assert!(results
			.iter()
			.filter_map(|r| r.as_ref().err())
			.all(|e| matches!(e, WorkflowError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_concurrent_identical_transitions() {
		let m = market().await;
		let order = order_at(&m, OrderStatus::Accepted).await;

		let results = join_all((0..5).map(|_| {
			m.engine
				.submit_shipping_address(&m.carrier, &order.id, "1 Harbour Rd")
		}))
		.await;

		assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
		assert!(results
			.iter()
			.filter_map(|r| r.as_ref().err())
			.all(|e| matches!(e, WorkflowError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_wrong_role_is_unauthorized_even_with_valid_input() {
		let m = market().await;
		let order = order_at(&m, OrderStatus::Accepted).await;

		for actor in [&m.buyer, &m.stranger] {
			let result = m
				.engine
				.submit_shipping_address(actor, &order.id, "1 Harbour Rd")
				.await;
			assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));
		}

		let order = order_at(&m, OrderStatus::AddressSubmitted).await;
		let result = m
			.engine
			.submit_tracking_number(&m.carrier, &order.id, "SF1001")
			.await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));
	}

	#[tokio::test]
	async fn test_wrong_predecessor_is_conflict_and_unchanged() {
		let m = market().await;
		let order = order_at(&m, OrderStatus::Ordered).await;
		let before = raw(&m, &order.id).await;

		let again = m
			.engine
			.submit_shipping_address(&m.carrier, &order.id, "2 Pier St")
			.await;
		assert!(matches!(again, Err(WorkflowError::Conflict(_))));

		let early = m.engine.complete_order(&m.buyer, &order.id, 5).await;
		assert!(matches!(early, Err(WorkflowError::Conflict(_))));

		assert_eq!(raw(&m, &order.id).await, before);
	}

	#[tokio::test]
	async fn test_check_precedence() {
		let m = market().await;
		let order = order_at(&m, OrderStatus::AddressSubmitted).await;

		// Wrong role with blank input: role is reported, not the input.
		let result = m.engine.submit_tracking_number(&m.carrier, &order.id, "").await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));

		// Right role, wrong status, blank input: the status is reported.
		let result = m.engine.submit_shipping_address(&m.carrier, &order.id, "").await;
		assert!(matches!(result, Err(WorkflowError::Conflict(_))));

		// Right role and status, blank input.
		let result = m.engine.submit_tracking_number(&m.buyer, &order.id, "   ").await;
		assert!(matches!(
			result,
			Err(WorkflowError::Validation {
				field: "tracking_number",
				..
			})
		));

		let missing = m
			.engine
			.submit_tracking_number(&m.buyer, &OrderId::new("missing"), "")
			.await;
		assert!(matches!(missing, Err(WorkflowError::NotFound { kind: "order", .. })));
	}

	#[tokio::test]
	async fn test_arrival_requires_date() {
		let m = market().await;
		let order = order_at(&m, OrderStatus::Ordered).await;

		let result = m
			.engine
			.submit_arrival_info(&m.carrier, &order.id, " ", Some("CA981"), None)
			.await;
		assert!(matches!(
			result,
			Err(WorkflowError::Validation {
				field: "estimated_arrival_date",
				..
			})
		));
	}

	#[tokio::test]
	async fn test_rating_bounds() {
		let m = market().await;
		let order = order_at(&m, OrderStatus::AwaitingPickup).await;
		let before = raw(&m, &order.id).await;

		for bad in [0, 6, -3] {
			let result = m.engine.complete_order(&m.buyer, &order.id, bad).await;
			assert!(matches!(result, Err(WorkflowError::Validation { field: "rating", .. })));
		}
		assert_eq!(raw(&m, &order.id).await, before);

		let done = m.engine.complete_order(&m.buyer, &order.id, 1).await.unwrap();
		assert_eq!(done.rating, Some(1));

		let other = order_at(&m, OrderStatus::AwaitingPickup).await;
		let done = m.engine.complete_order(&m.buyer, &other.id, 5).await.unwrap();
		assert_eq!(done.rating, Some(5));
	}

	#[tokio::test]
	async fn test_views_follow_the_turn() {
		let m = market().await;
		let order = order_at(&m, OrderStatus::Ordered).await;

		let carrier_view = m.engine.get_order_view(&m.carrier, &order.id).await.unwrap();
		assert!(carrier_view.user_is_carrier);
		assert_eq!(carrier_view.next_action, Some(OrderAction::SubmitArrivalInfo));
		assert_eq!(carrier_view.status_label, "Ordered and shipped");
		assert_eq!(carrier_view.progress_step, 3);

		let buyer_view = m
			.engine
			.get_order_view_by_listing(&m.buyer, &order.listing_id)
			.await
			.unwrap();
		assert!(buyer_view.user_is_buyer);
		assert_eq!(buyer_view.order.id, order.id);
		assert_eq!(buyer_view.next_action, None);

		let stranger = m.engine.get_order_view(&m.stranger, &order.id).await;
		assert!(matches!(stranger, Err(WorkflowError::Unauthorized(_))));

		let open = listing(&m).await;
		let none = m.engine.get_order_view_by_listing(&m.buyer, &open).await;
		assert!(matches!(none, Err(WorkflowError::NotFound { .. })));
	}

	#[tokio::test]
	async fn test_one_notification_per_transition() {
		let mut sink = MockNotificationSink::new();
		sink.expect_notify().times(5).returning(|_| Ok(()));
		let m = market_on(Box::new(MemoryStorage::new()), Box::new(sink)).await;

		let order = order_at(&m, OrderStatus::Received).await;
		// Rejected operations do not notify.
		let _ = m.engine.complete_order(&m.buyer, &order.id, 5).await;
	}

	#[tokio::test]
	async fn test_failing_notifier_does_not_affect_result() {
		let mut sink = MockNotificationSink::new();
		sink.expect_notify()
			.returning(|_| Err(NotifyError::Delivery("gateway timeout".into())));
		let m = market_on(Box::new(MemoryStorage::new()), Box::new(sink)).await;

		let order = order_at(&m, OrderStatus::Received).await;
		assert_eq!(order.status, OrderStatus::Received);
	}

	#[tokio::test]
	async fn test_bus_subscribers_see_transitions() {
		let bus = EventBus::new(16);
		let mut events = bus.subscribe();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let engine = WorkflowEngine::new(
			ConfigBuilder::new().build(),
			storage,
			Box::new(BusNotifier::new(bus.clone())),
			bus,
		);
		let buyer = engine.register_user("b").await.unwrap().id;
		let carrier = engine.register_user("c").await.unwrap().id;
		let listing = engine.publish_listing(&buyer, json!({})).await.unwrap();

		let order = engine.accept_listing(&carrier, &listing.id).await.unwrap();
		engine
			.submit_shipping_address(&carrier, &order.id, "addr")
			.await
			.unwrap();

		let first = events.recv().await.unwrap();
		assert_eq!(first.kind, EventKind::ListingAccepted);
		assert_eq!(first.actor_id, carrier);
		let second = events.recv().await.unwrap();
		assert_eq!(second.kind, EventKind::AddressSubmitted);
		assert_eq!(second.status, OrderStatus::AddressSubmitted);
	}

	#[tokio::test]
	async fn test_listing_collaborator_rules() {
		let m = market().await;
		let listing_id = listing(&m).await;

		let result = m.engine.delete_listing(&m.stranger, &listing_id).await;
		assert!(matches!(result, Err(WorkflowError::Unauthorized(_))));

		let admin = m.engine.users().register("admin", true).await.unwrap();
		m.engine.delete_listing(&admin.id, &listing_id).await.unwrap();

		let accepted = order_at(&m, OrderStatus::Accepted).await.listing_id;
		let result = m.engine.delete_listing(&m.buyer, &accepted).await;
		assert!(matches!(result, Err(WorkflowError::Conflict(_))));

		let unknown = m
			.engine
			.publish_listing(&UserId::new("ghost"), json!({}))
			.await;
		assert!(matches!(unknown, Err(WorkflowError::Unauthorized(_))));
	}

	#[tokio::test]
	async fn test_file_backend_persists_orders() {
		let dir = tempfile::TempDir::new().unwrap();
		let (order_id, buyer) = {
			let m = market_on(
				Box::new(FileStorage::new(dir.path().to_path_buf())),
				silent_sink(),
			)
			.await;
			let order = order_at(&m, OrderStatus::Ordered).await;
			(order.id, m.buyer)
		};

		let storage = Arc::new(StorageService::new(Box::new(FileStorage::new(
			dir.path().to_path_buf(),
		))));
		let reopened = WorkflowEngine::new(
			ConfigBuilder::new().build(),
			storage,
			silent_sink(),
			EventBus::new(4),
		);
		let view = reopened.get_order_view(&buyer, &order_id).await.unwrap();
		assert_eq!(view.order.status, OrderStatus::Ordered);
		assert_eq!(view.order.tracking_number.as_deref(), Some("SF1001"));
	}
}
