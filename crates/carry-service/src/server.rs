//! HTTP server for the marketplace API.
//!
//! Every route lives under `/api`. The acting user of a request is taken from
//! the `X-Actor-Id` header; see [`crate::apis::Actor`].

use crate::apis::{listings, orders, users};
use axum::{
	extract::DefaultBodyLimit,
	http::{HeaderName, HeaderValue, Method, StatusCode},
	routing::{get, post},
	Router,
};
use carry_config::{ApiConfig, CorsConfig};
use carry_core::WorkflowEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<WorkflowEngine>,
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<WorkflowEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(AppState { engine }, &api_config);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Marketplace API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

pub fn build_router(state: AppState, api_config: &ApiConfig) -> Router {
	let api = Router::new()
		.route("/users", post(users::register_user))
		.route("/listings", post(listings::publish_listing))
		.route(
			"/listings/{id}",
			get(listings::get_listing).delete(listings::delete_listing),
		)
		.route("/listings/{id}/accept", post(listings::accept_listing))
		.route("/listings/{id}/order", get(orders::get_order_view_by_listing))
		.route("/orders/{id}", get(orders::get_order_view))
		.route(
			"/orders/{id}/shipping-address",
			post(orders::submit_shipping_address),
		)
		.route(
			"/orders/{id}/tracking-number",
			post(orders::submit_tracking_number),
		)
		.route("/orders/{id}/arrival", post(orders::submit_arrival_info))
		.route("/orders/{id}/complete", post(orders::complete_order));

	Router::new()
		.nest("/api", api)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors_layer(api_config.cors.as_ref()))
				.layer(timeout_layer(api_config.timeout_seconds))
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state)
}

/// Requests still running after `seconds` are answered with 408.
fn timeout_layer(seconds: u64) -> TimeoutLayer {
	TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(seconds))
}

/// CORS from configuration, or permissive when none is configured.
///
/// Entries that are not valid header values are skipped with a warning.
fn cors_layer(cors: Option<&CorsConfig>) -> CorsLayer {
	let Some(cors) = cors else {
		return CorsLayer::permissive();
	};

	let origins: Vec<HeaderValue> = parse_all("origin", &cors.allowed_origins);
	let methods: Vec<Method> = parse_all("method", &cors.allowed_methods);
	let headers: Vec<HeaderName> = parse_all("header", &cors.allowed_headers);

	CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_methods(AllowMethods::list(methods))
		.allow_headers(AllowHeaders::list(headers))
}

fn parse_all<T: std::str::FromStr>(kind: &str, values: &[String]) -> Vec<T> {
	values
		.iter()
		.filter_map(|value| match value.parse() {
			Ok(parsed) => Some(parsed),
			Err(_) => {
				tracing::warn!("Ignoring invalid CORS {} '{}'", kind, value);
				None
			},
		})
		.collect()
}
