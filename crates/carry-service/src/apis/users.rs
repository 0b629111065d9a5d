//! User registration.

use super::{body, rejected};
use crate::server::AppState;
use axum::{
	extract::{rejection::JsonRejection, State},
	http::StatusCode,
	Json,
};
use carry_types::{APIError, RegisterUserRequest, User};

/// Handles POST /api/users requests.
///
/// Registration needs no acting user; the new account's id is returned and
/// used as `X-Actor-Id` on later requests.
pub async fn register_user(
	State(state): State<AppState>,
	payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), APIError> {
	let request = body(payload)?;
	let user = state
		.engine
		.register_user(&request.username)
		.await
		.map_err(|e| rejected("register_user", e))?;
	Ok((StatusCode::CREATED, Json(user)))
}
