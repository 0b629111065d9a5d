//! Notifier that writes one structured log line per event.

use crate::engine::event_bus::EventBus;
use crate::notifications::{NotificationSink, NotifierFactory, NotifierRegistry, NotifyError};
use carry_types::{
	truncate_id, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError,
	WorkflowEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
	Debug,
	Info,
	Warn,
}

pub struct LogNotifier {
	level: Level,
}

impl LogNotifier {
	pub fn new() -> Self {
		Self { level: Level::Info }
	}
}

impl Default for LogNotifier {
	fn default() -> Self {
		Self::new()
	}
}

impl NotificationSink for LogNotifier {
	fn notify(&self, event: &WorkflowEvent) -> Result<(), NotifyError> {
		let order_id = truncate_id(event.order_id.as_str());
		let message = event.describe();
		match self.level {
			Level::Debug => tracing::debug!(
				order_id = %order_id,
				kind = %event.kind,
				status = %event.status,
				"{}",
				message
			),
			Level::Info => tracing::info!(
				order_id = %order_id,
				kind = %event.kind,
				status = %event.status,
				"{}",
				message
			),
			Level::Warn => tracing::warn!(
				order_id = %order_id,
				kind = %event.kind,
				status = %event.status,
				"{}",
				message
			),
		}
		Ok(())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LogNotifierSchema)
	}
}

pub struct LogNotifierSchema;

impl ConfigSchema for LogNotifierSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![Field::new(
				"level",
				FieldType::OneOf(&["debug", "info", "warn"]),
			)],
		)
		.validate(config)
	}
}

/// Configuration parameters:
/// - `level`: one of "debug", "info", "warn" (default: "info")
pub fn create_notifier(
	config: &toml::Value,
	_bus: &EventBus,
) -> Result<Box<dyn NotificationSink>, NotifyError> {
	LogNotifierSchema
		.validate(config)
		.map_err(|e| NotifyError::Configuration(e.to_string()))?;

	let level = match config.get("level").and_then(|v| v.as_str()) {
		Some("debug") => Level::Debug,
		Some("warn") => Level::Warn,
		_ => Level::Info,
	};
	Ok(Box::new(LogNotifier { level }))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "log";
	type Factory = NotifierFactory;

	fn factory() -> Self::Factory {
		create_notifier
	}
}

impl NotifierRegistry for Registry {}
