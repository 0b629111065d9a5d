//! Notifier that publishes events on the in-process event bus.
//!
//! Having no subscribers is not an error; the event is simply dropped.

use crate::engine::event_bus::EventBus;
use crate::notifications::{NotificationSink, NotifierFactory, NotifierRegistry, NotifyError};
use carry_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError, WorkflowEvent};

pub struct BusNotifier {
	bus: EventBus,
}

impl BusNotifier {
	pub fn new(bus: EventBus) -> Self {
		Self { bus }
	}
}

impl NotificationSink for BusNotifier {
	fn notify(&self, event: &WorkflowEvent) -> Result<(), NotifyError> {
		match self.bus.publish(event.clone()) {
			Ok(receivers) => {
				tracing::debug!(order_id = %event.order_id, receivers, "Event published");
			},
			Err(_) => {
				tracing::debug!(order_id = %event.order_id, "Event dropped, no subscribers");
			},
		}
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(BusNotifierSchema)
	}
}

pub struct BusNotifierSchema;

impl ConfigSchema for BusNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::default().validate(config)
	}
}

pub fn create_notifier(
	config: &toml::Value,
	bus: &EventBus,
) -> Result<Box<dyn NotificationSink>, NotifyError> {
	BusNotifierSchema
		.validate(config)
		.map_err(|e| NotifyError::Configuration(e.to_string()))?;
	Ok(Box::new(BusNotifier::new(bus.clone())))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "bus";
	type Factory = NotifierFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotifierRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use carry_types::{EventKind, ListingId, Order, OrderId, UserId};

	fn event() -> WorkflowEvent {
		let order = Order::accepted(
			OrderId::new("o1"),
			ListingId::new("l1"),
			UserId::new("carrier"),
			5,
		);
		WorkflowEvent::for_order(&order, UserId::new("carrier"))
	}

	#[tokio::test]
	async fn test_subscribers_receive_events() {
		let bus = EventBus::new(8);
		let mut receiver = bus.subscribe();
		let notifier = BusNotifier::new(bus);

		notifier.notify(&event()).unwrap();

		let received = receiver.recv().await.unwrap();
		assert_eq!(received.kind, EventKind::ListingAccepted);
		assert_eq!(received.order_id, OrderId::new("o1"));
	}

	#[test]
	fn test_no_subscribers_is_ok() {
		let notifier = BusNotifier::new(EventBus::new(8));
		assert!(notifier.notify(&event()).is_ok());
	}
}
