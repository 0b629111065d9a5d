//! Main entry point for the carry marketplace service.
//!
//! Loads the configuration, assembles the workflow engine from the configured
//! storage and notification implementations, and serves the HTTP API.

use carry_config::Config;
use carry_core::{MarketplaceBuilder, MarketplaceFactories, WorkflowEngine};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the marketplace service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started marketplace");

	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.marketplace.id);

	let api_config = match config.api.clone() {
		Some(api) if api.enabled => api,
		_ => {
			tracing::error!("API server is disabled; nothing to serve");
			return Err("the [api] section must be present and enabled".into());
		},
	};

	let engine = Arc::new(build_engine(config)?);
	server::start_server(api_config, engine).await?;

	tracing::info!("Stopped marketplace");
	Ok(())
}

/// Builds the workflow engine with every registered implementation available.
fn build_engine(config: Config) -> Result<WorkflowEngine, carry_core::BuilderError> {
	let factories = MarketplaceFactories {
		storage_factories: carry_storage::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
		notifier_factories: carry_core::notifications::get_all_implementations()
			.into_iter()
			.map(|(name, factory)| (name.to_string(), factory))
			.collect(),
	};

	MarketplaceBuilder::new(config).build(factories)
}
