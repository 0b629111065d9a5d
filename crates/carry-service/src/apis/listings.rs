//! Listing endpoints, including acceptance by a carrier.

use super::{body, rejected, Actor};
use crate::server::AppState;
use axum::{
	extract::{rejection::JsonRejection, Path, State},
	http::StatusCode,
	Json,
};
use carry_types::{APIError, Listing, ListingId, Order, PublishListingRequest};

/// Handles POST /api/listings requests.
pub async fn publish_listing(
	State(state): State<AppState>,
	Actor(actor): Actor,
	payload: Result<Json<PublishListingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Listing>), APIError> {
	let request = body(payload)?;
	let listing = state
		.engine
		.publish_listing(&actor, request.details)
		.await
		.map_err(|e| rejected("publish_listing", e))?;
	Ok((StatusCode::CREATED, Json(listing)))
}

/// Handles GET /api/listings/{id} requests. Listings are public.
pub async fn get_listing(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Listing>, APIError> {
	state
		.engine
		.get_listing(&ListingId::new(id))
		.await
		.map(Json)
		.map_err(|e| rejected("get_listing", e))
}

/// Handles DELETE /api/listings/{id} requests.
pub async fn delete_listing(
	State(state): State<AppState>,
	Actor(actor): Actor,
	Path(id): Path<String>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.delete_listing(&actor, &ListingId::new(id))
		.await
		.map_err(|e| rejected("delete_listing", e))?;
	Ok(StatusCode::NO_CONTENT)
}

/// Handles POST /api/listings/{id}/accept requests.
///
/// The acting user becomes the carrier of the new order.
pub async fn accept_listing(
	State(state): State<AppState>,
	Actor(actor): Actor,
	Path(id): Path<String>,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let order = state
		.engine
		.accept_listing(&actor, &ListingId::new(id))
		.await
		.map_err(|e| rejected("accept_listing", e))?;
	Ok((StatusCode::CREATED, Json(order)))
}
