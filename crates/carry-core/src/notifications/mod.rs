//! Notification of workflow progress.
//!
//! After every successful transition the engine hands a [`WorkflowEvent`] to
//! the configured sink. Delivery is best effort: a sink failure is logged and
//! never affects the transition that produced the event.

use crate::engine::event_bus::EventBus;
use carry_types::{ConfigSchema, ImplementationRegistry, WorkflowEvent};
use thiserror::Error;

pub mod implementations {
	pub mod bus;
	pub mod log;
}

#[derive(Debug, Error)]
pub enum NotifyError {
	#[error("Delivery failed: {0}")]
	Delivery(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Destination for workflow events.
///
/// `notify` must not block; implementations that talk to slow channels should
/// hand the event off and return.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
	fn notify(&self, event: &WorkflowEvent) -> Result<(), NotifyError>;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for notifier factory functions.
pub type NotifierFactory =
	fn(&toml::Value, &EventBus) -> Result<Box<dyn NotificationSink>, NotifyError>;

/// Registry trait for notifier implementations.
pub trait NotifierRegistry: ImplementationRegistry<Factory = NotifierFactory> {}

/// Get all registered notifier implementations.
pub fn get_all_implementations() -> Vec<(&'static str, NotifierFactory)> {
	use implementations::{bus, log};

	vec![
		(bus::Registry::NAME, bus::Registry::factory()),
		(log::Registry::NAME, log::Registry::factory()),
	]
}

/// Wraps the configured sink and swallows its failures.
pub struct NotificationService {
	sink: Box<dyn NotificationSink>,
}

impl NotificationService {
	pub fn new(sink: Box<dyn NotificationSink>) -> Self {
		Self { sink }
	}

	pub fn dispatch(&self, event: &WorkflowEvent) {
		if let Err(e) = self.sink.notify(event) {
			tracing::warn!(
				order_id = %event.order_id,
				kind = %event.kind,
				error = %e,
				"Notification failed"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use carry_types::{ListingId, Order, OrderId, UserId};

	fn event() -> WorkflowEvent {
		let order = Order::accepted(
			OrderId::new("o1"),
			ListingId::new("l1"),
			UserId::new("carrier"),
			5,
		);
		WorkflowEvent::for_order(&order, UserId::new("carrier"))
	}

	#[test]
	fn test_dispatch_swallows_failures() {
		let mut sink = MockNotificationSink::new();
		sink.expect_notify()
			.times(1)
			.returning(|_| Err(NotifyError::Delivery("smtp down".into())));

		NotificationService::new(Box::new(sink)).dispatch(&event());
	}

	#[test]
	fn test_registry_names() {
		let names: Vec<&str> = get_all_implementations()
			.into_iter()
			.map(|(name, _)| name)
			.collect();
		assert_eq!(names, vec!["bus", "log"]);
	}
}
