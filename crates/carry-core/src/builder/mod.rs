//! Builder pattern for constructing the marketplace engine.
//!
//! Composes a [`WorkflowEngine`] from the configured storage backend and
//! notifier using factory functions, so implementations can be swapped from
//! configuration alone.

use crate::engine::{event_bus::EventBus, WorkflowEngine};
use crate::notifications::{NotificationSink, NotifyError};
use carry_config::Config;
use carry_storage::{StorageError, StorageInterface, StorageService};
use carry_types::ConfigSchema;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Factory functions for every pluggable component, keyed by implementation name.
pub struct MarketplaceFactories<SF, NF> {
	pub storage_factories: HashMap<String, SF>,
	pub notifier_factories: HashMap<String, NF>,
}

/// Builder for constructing a WorkflowEngine with pluggable implementations.
pub struct MarketplaceBuilder {
	config: Config,
}

impl MarketplaceBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the engine from the primary storage and notifier implementations.
	///
	/// Only the primaries are instantiated; other configured implementations
	/// are ignored. Each instance's own schema is checked against its table,
	/// whatever its factory already did.
	pub fn build<SF, NF>(
		self,
		factories: MarketplaceFactories<SF, NF>,
	) -> Result<WorkflowEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		NF: Fn(&toml::Value, &EventBus) -> Result<Box<dyn NotificationSink>, NotifyError>,
	{
		let storage_backend = {
			let (name, config, factory) = primary(
				"storage",
				&self.config.storage.primary,
				&self.config.storage.implementations,
				&factories.storage_factories,
			)?;
			let backend = factory(config).map_err(|e| failed("storage", name, e))?;
			backend
				.config_schema()
				.validate(config)
				.map_err(|e| failed("storage", name, e))?;
			backend
		};
		tracing::info!(component = "storage", implementation = %self.config.storage.primary, "Loaded");

		let event_bus = EventBus::new(self.config.notifications.bus_capacity);

		let notifier = {
			let (name, config, factory) = primary(
				"notifications",
				&self.config.notifications.primary,
				&self.config.notifications.implementations,
				&factories.notifier_factories,
			)?;
			let notifier =
				factory(config, &event_bus).map_err(|e| failed("notifications", name, e))?;
			notifier
				.config_schema()
				.validate(config)
				.map_err(|e| failed("notifications", name, e))?;
			notifier
		};
		tracing::info!(component = "notifications", implementation = %self.config.notifications.primary, "Loaded");

		let storage = Arc::new(StorageService::new(storage_backend));
		Ok(WorkflowEngine::new(self.config, storage, notifier, event_bus))
	}
}

/// Looks up the primary implementation's table and factory.
fn primary<'a, F>(
	component: &str,
	name: &'a str,
	implementations: &'a HashMap<String, toml::Value>,
	factories: &'a HashMap<String, F>,
) -> Result<(&'a str, &'a toml::Value, &'a F), BuilderError> {
	let config = implementations.get(name).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' has no configuration table",
			component, name
		))
	})?;
	let factory = factories.get(name).ok_or_else(|| {
		BuilderError::Config(format!(
			"Unknown {} implementation '{}'",
			component, name
		))
	})?;
	Ok((name, config, factory))
}

fn failed(component: &str, name: &str, error: impl std::fmt::Display) -> BuilderError {
	tracing::error!(
		component = component,
		implementation = %name,
		error = %error,
		"Failed to create implementation"
	);
	BuilderError::Config(format!(
		"Failed to create {} implementation '{}': {}",
		component, name, error
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::notifications;
	use carry_config::builders::config::ConfigBuilder;

	fn factories() -> MarketplaceFactories<carry_storage::StorageFactory, notifications::NotifierFactory>
	{
		MarketplaceFactories {
			storage_factories: carry_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			notifier_factories: notifications::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_builds_from_defaults() {
		let engine = MarketplaceBuilder::new(ConfigBuilder::new().build())
			.build(factories())
			.unwrap();
		let user = engine.register_user("first").await.unwrap();
		assert!(engine.users().exists(&user.id).await.unwrap());
	}

	#[test]
	fn test_unknown_implementation() {
		let config = ConfigBuilder::new()
			.storage("redis", toml::Value::Table(toml::Table::new()))
			.build();
		let result = MarketplaceBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(msg)) if msg.contains("redis")));
	}

	#[test]
	fn test_invalid_implementation_table() {
		let config = ConfigBuilder::new()
			.notifications("log", toml::from_str("level = \"loud\"").unwrap())
			.build();
		let result = MarketplaceBuilder::new(config).build(factories());
		assert!(matches!(result, Err(BuilderError::Config(msg)) if msg.contains("notifications")));
	}

	#[test]
	fn test_schema_checked_after_factory() {
		fn lenient_memory(_: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
			Ok(Box::new(
				carry_storage::implementations::memory::MemoryStorage::new(),
			))
		}

		let mut factories = factories();
		factories
			.storage_factories
			.insert("memory".to_string(), lenient_memory);
		let config = ConfigBuilder::new()
			.storage("memory", toml::from_str("capacity = 10").unwrap())
			.build();

		let result = MarketplaceBuilder::new(config).build(factories);
		assert!(matches!(result, Err(BuilderError::Config(msg)) if msg.contains("storage")));
	}

	#[tokio::test]
	async fn test_bus_notifier_shares_engine_bus() {
		let config = ConfigBuilder::new()
			.notifications("bus", toml::Value::Table(toml::Table::new()))
			.build();
		let engine = MarketplaceBuilder::new(config).build(factories()).unwrap();
		let mut events = engine.event_bus().subscribe();

		let buyer = engine.register_user("b").await.unwrap().id;
		let carrier = engine.register_user("c").await.unwrap().id;
		let listing = engine
			.publish_listing(&buyer, serde_json::json!({}))
			.await
			.unwrap();
		engine.accept_listing(&carrier, &listing.id).await.unwrap();

		assert_eq!(events.recv().await.unwrap().listing_id, listing.id);
	}
}
