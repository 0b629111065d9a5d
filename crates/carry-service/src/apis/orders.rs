//! Order views and the four post-acceptance workflow steps.

use super::{body, rejected, Actor};
use crate::server::AppState;
use axum::{
	extract::{rejection::JsonRejection, Path, State},
	Json,
};
use carry_types::{
	APIError, ArrivalInfoRequest, CompleteOrderRequest, ListingId, Order, OrderId, OrderView,
	ShippingAddressRequest, TrackingNumberRequest,
};

/// Handles GET /api/orders/{id} requests.
pub async fn get_order_view(
	State(state): State<AppState>,
	Actor(actor): Actor,
	Path(id): Path<String>,
) -> Result<Json<OrderView>, APIError> {
	state
		.engine
		.get_order_view(&actor, &OrderId::new(id))
		.await
		.map(Json)
		.map_err(|e| rejected("get_order_view", e))
}

/// Handles GET /api/listings/{id}/order requests.
pub async fn get_order_view_by_listing(
	State(state): State<AppState>,
	Actor(actor): Actor,
	Path(id): Path<String>,
) -> Result<Json<OrderView>, APIError> {
	state
		.engine
		.get_order_view_by_listing(&actor, &ListingId::new(id))
		.await
		.map(Json)
		.map_err(|e| rejected("get_order_view_by_listing", e))
}

/// Handles POST /api/orders/{id}/shipping-address requests.
pub async fn submit_shipping_address(
	State(state): State<AppState>,
	Actor(actor): Actor,
	Path(id): Path<String>,
	payload: Result<Json<ShippingAddressRequest>, JsonRejection>,
) -> Result<Json<Order>, APIError> {
	let request = body(payload)?;
	state
		.engine
		.submit_shipping_address(&actor, &OrderId::new(id), &request.shipping_address)
		.await
		.map(Json)
		.map_err(|e| rejected("submit_shipping_address", e))
}

/// Handles POST /api/orders/{id}/tracking-number requests.
pub async fn submit_tracking_number(
	State(state): State<AppState>,
	Actor(actor): Actor,
	Path(id): Path<String>,
	payload: Result<Json<TrackingNumberRequest>, JsonRejection>,
) -> Result<Json<Order>, APIError> {
	let request = body(payload)?;
	state
		.engine
		.submit_tracking_number(&actor, &OrderId::new(id), &request.tracking_number)
		.await
		.map(Json)
		.map_err(|e| rejected("submit_tracking_number", e))
}

/// Handles POST /api/orders/{id}/arrival requests.
pub async fn submit_arrival_info(
	State(state): State<AppState>,
	Actor(actor): Actor,
	Path(id): Path<String>,
	payload: Result<Json<ArrivalInfoRequest>, JsonRejection>,
) -> Result<Json<Order>, APIError> {
	let request = body(payload)?;
	state
		.engine
		.submit_arrival_info(
			&actor,
			&OrderId::new(id),
			&request.estimated_arrival_date,
			request.flight_number.as_deref(),
			request.pickup_location.as_deref(),
		)
		.await
		.map(Json)
		.map_err(|e| rejected("submit_arrival_info", e))
}

/// Handles POST /api/orders/{id}/complete requests.
pub async fn complete_order(
	State(state): State<AppState>,
	Actor(actor): Actor,
	Path(id): Path<String>,
	payload: Result<Json<CompleteOrderRequest>, JsonRejection>,
) -> Result<Json<Order>, APIError> {
	let request = body(payload)?;
	state
		.engine
		.complete_order(&actor, &OrderId::new(id), request.rating)
		.await
		.map(Json)
		.map_err(|e| rejected("complete_order", e))
}
