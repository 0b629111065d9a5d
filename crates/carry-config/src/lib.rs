//! Marketplace configuration.
//!
//! Configuration is TOML with `${VAR}` and `${VAR:-default}` substitution. A
//! file may pull in others with `include = ["storage.toml", ...]`; a top-level
//! section may be defined in only one of them.

mod loader;

/// Builders for test and development configurations.
#[cfg(any(test, feature = "testing"))]
pub mod builders {
	pub mod config;
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Parse error: {0}")]
	Parse(String),
	#[error("Invalid configuration: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The Display form echoes the whole document.
		ConfigError::Parse(err.message().to_string())
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub marketplace: MarketplaceConfig,
	pub storage: StorageConfig,
	pub notifications: NotificationsConfig,
	/// Absent means the service has nothing to serve.
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketplaceConfig {
	/// Instance name, shown in logs.
	pub id: String,
}

/// `[storage]`: the backend named by `primary` is built from its table in
/// `implementations`; the other tables are kept but unused.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// `[notifications]`, shaped like `[storage]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationsConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
	/// Events buffered per event bus subscriber before the slowest lags.
	#[serde(default = "default_bus_capacity")]
	pub bus_capacity: usize,
}

fn default_bus_capacity() -> usize {
	1000
}

/// `[api]`: HTTP listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Per-request deadline.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Largest accepted request body, in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Permissive CORS when unset.
	pub cors: Option<CorsConfig>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_api_host(),
			port: default_api_port(),
			timeout_seconds: default_api_timeout(),
			max_request_size: default_max_request_size(),
			cors: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
	pub allowed_headers: Vec<String>,
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	64 * 1024
}

/// Substitutes `${VAR}` and `${VAR:-default}` in `input`.
///
/// A variable that is unset and has no default is an error. Inputs over 1 MiB
/// are rejected before matching.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_CONFIG_BYTES: usize = 1024 * 1024;
	if input.len() > MAX_CONFIG_BYTES {
		return Err(ConfigError::Validation(format!(
			"configuration is {} bytes, limit is {}",
			input.len(),
			MAX_CONFIG_BYTES
		)));
	}

	let pattern = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("bad substitution pattern: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in pattern.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();

		let value = match (std::env::var(var_name), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"environment variable {} is not set and has no default",
					var_name
				)));
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

/// Checks that `primary` names one of `implementations`.
fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

impl Config {
	/// Reads `path` and any files it includes, relative to its directory.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path = Path::new(path);
		let root_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let file_name = path.file_name().ok_or_else(|| {
			ConfigError::Validation(format!("{} does not name a file", path.display()))
		})?;

		loader::ConfigLoader::new(root_dir)
			.load_config(file_name)
			.await
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.marketplace.id.trim().is_empty() {
			return Err(ConfigError::Validation(
				"Marketplace ID cannot be empty".into(),
			));
		}

		validate_primary(
			"storage",
			&self.storage.primary,
			&self.storage.implementations,
		)?;
		validate_primary(
			"notifications",
			&self.notifications.primary,
			&self.notifications.implementations,
		)?;

		if self.notifications.bus_capacity == 0 {
			return Err(ConfigError::Validation(
				"notifications.bus_capacity must be greater than 0".into(),
			));
		}

		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"api.timeout_seconds must be greater than 0".into(),
				));
			}
			if api.max_request_size == 0 {
				return Err(ConfigError::Validation(
					"api.max_request_size must be greater than 0".into(),
				));
			}
		}

		Ok(())
	}
}

/// Parses a single document; `include` is not followed here.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
