//! Configuration builder for creating test and development configurations.

use crate::{ApiConfig, Config, MarketplaceConfig, NotificationsConfig, StorageConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
///
/// Defaults to in-memory storage and the log notifier, each with an empty
/// implementation table.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	marketplace_id: String,
	storage_primary: String,
	storage_config: toml::Value,
	notifications_primary: String,
	notifications_config: toml::Value,
	bus_capacity: usize,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			marketplace_id: "test-market".to_string(),
			storage_primary: "memory".to_string(),
			storage_config: empty_table(),
			notifications_primary: "log".to_string(),
			notifications_config: empty_table(),
			bus_capacity: 16,
			api: None,
		}
	}

	pub fn marketplace_id(mut self, id: impl Into<String>) -> Self {
		self.marketplace_id = id.into();
		self
	}

	/// Sets the primary storage implementation and its table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.storage_primary = primary.into();
		self.storage_config = config;
		self
	}

	/// Sets the primary notifier implementation and its table.
	pub fn notifications(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		self.notifications_primary = primary.into();
		self.notifications_config = config;
		self
	}

	pub fn bus_capacity(mut self, capacity: usize) -> Self {
		self.bus_capacity = capacity;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		Config {
			marketplace: MarketplaceConfig {
				id: self.marketplace_id,
			},
			storage: StorageConfig {
				implementations: HashMap::from([(
					self.storage_primary.clone(),
					self.storage_config,
				)]),
				primary: self.storage_primary,
			},
			notifications: NotificationsConfig {
				implementations: HashMap::from([(
					self.notifications_primary.clone(),
					self.notifications_config,
				)]),
				primary: self.notifications_primary,
				bus_capacity: self.bus_capacity,
			},
			api: self.api,
		}
	}
}
