//! Request handlers for the marketplace API.

pub mod listings;
pub mod orders;
pub mod users;

use axum::{
	extract::{rejection::JsonRejection, FromRequestParts},
	http::request::Parts,
	Json,
};
use carry_core::WorkflowError;
use carry_types::{APIError, UserId};

pub const ACTOR_HEADER: &str = "X-Actor-Id";

/// The user on whose behalf a request is made.
///
/// Rejects the request with 401 when the header is missing or blank. Whether
/// the id names a registered user is decided by the workflow, not here.
#[derive(Debug, Clone)]
pub struct Actor(pub UserId);

impl<S> FromRequestParts<S> for Actor
where
	S: Send + Sync,
{
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let actor = parts
			.headers
			.get(ACTOR_HEADER)
			.and_then(|value| value.to_str().ok())
			.map(str::trim)
			.filter(|value| !value.is_empty());

		match actor {
			Some(id) => Ok(Actor(UserId::new(id))),
			None => Err(APIError::Unauthenticated {
				message: format!("missing {} header", ACTOR_HEADER),
			}),
		}
	}
}

/// Unwraps a JSON body, turning decode failures into a 400 [`APIError`].
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, APIError> {
	match payload {
		Ok(Json(value)) => Ok(value),
		Err(rejection) => {
			tracing::debug!("Rejected request body: {}", rejection.body_text());
			Err(APIError::BadRequest {
				error_type: "INVALID_REQUEST".to_string(),
				message: rejection.body_text(),
			})
		},
	}
}

/// Logs a failed workflow call and converts it for the response.
pub(crate) fn rejected(operation: &str, error: WorkflowError) -> APIError {
	match error {
		WorkflowError::Storage(_) => {
			tracing::error!(operation, error = %error, "Request failed")
		},
		_ => tracing::warn!(operation, error = %error, "Request rejected"),
	}
	APIError::from(error)
}
