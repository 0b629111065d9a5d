//! API types for the marketplace HTTP API.
//!
//! This module defines the request bodies accepted by the workflow endpoints
//! and the structured error type returned by every endpoint.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Request body for registering a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
	pub username: String,
}

/// Request body for publishing a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishListingRequest {
	/// Descriptive payload (item, destination, weight, fee, contacts).
	pub details: serde_json::Value,
}

/// Request body for the carrier's shipping address step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddressRequest {
	#[serde(rename = "shippingAddress")]
	pub shipping_address: String,
}

/// Request body for the buyer's tracking number step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingNumberRequest {
	#[serde(rename = "trackingNumber")]
	pub tracking_number: String,
}

/// Request body for the carrier's arrival step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrivalInfoRequest {
	#[serde(rename = "estimatedArrivalDate")]
	pub estimated_arrival_date: String,
	#[serde(rename = "flightNumber", default)]
	pub flight_number: Option<String>,
	#[serde(rename = "pickupLocation", default)]
	pub pickup_location: Option<String>,
}

/// Request body for the buyer's receipt step.
///
/// The rating is accepted as any integer so that out-of-range values reach
/// the workflow's validation instead of failing JSON decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteOrderRequest {
	pub rating: i64,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Invalid input (400)
	BadRequest { error_type: String, message: String },
	/// No acting user supplied (401)
	Unauthenticated { message: String },
	/// Acting user may not perform this operation (403)
	Forbidden { error_type: String, message: String },
	/// Referenced record does not exist (404)
	NotFound { error_type: String, message: String },
	/// Operation conflicts with current state (409)
	Conflict { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Unauthenticated { .. } => 401,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message) = match self {
			APIError::Unauthenticated { message } => ("UNAUTHENTICATED", message),
			APIError::BadRequest { error_type, message }
			| APIError::Forbidden { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::Conflict { error_type, message }
			| APIError::InternalServerError { error_type, message } => (error_type.as_str(), message),
		};
		ErrorResponse {
			error: error.to_string(),
			message: message.clone(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Unauthenticated { message } => write!(f, "Unauthenticated: {}", message),
			APIError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
