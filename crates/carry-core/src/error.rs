//! Error type shared by every workflow operation.

use carry_storage::StorageError;
use carry_types::APIError;
use thiserror::Error;

/// Outcome of a rejected workflow operation.
///
/// Variants are ordered by the priority in which they are checked: a missing
/// record is reported before a role problem, a role problem before a status
/// conflict, and a status conflict before bad input.
#[derive(Debug, Error)]
pub enum WorkflowError {
	#[error("{kind} not found: {id}")]
	NotFound { kind: &'static str, id: String },
	#[error("Unauthorized: {0}")]
	Unauthorized(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Invalid {field}: {message}")]
	Validation { field: &'static str, message: String },
	/// Backend failure; not a workflow outcome.
	#[error("Storage error: {0}")]
	Storage(String),
}

impl WorkflowError {
	pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
		WorkflowError::NotFound {
			kind,
			id: id.to_string(),
		}
	}

	pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
		WorkflowError::Validation {
			field,
			message: message.into(),
		}
	}

	/// Maps a storage failure from reading one record, naming the record.
	pub(crate) fn lookup(kind: &'static str, id: impl ToString) -> impl FnOnce(StorageError) -> Self {
		move |e| match e {
			StorageError::NotFound => Self::not_found(kind, id),
			other => other.into(),
		}
	}

	/// Maps a failed commit, describing what the lost race was about.
	pub(crate) fn commit(context: impl Into<String>) -> impl FnOnce(StorageError) -> Self {
		move |e| match e {
			StorageError::Conflict(_) => WorkflowError::Conflict(context.into()),
			other => other.into(),
		}
	}
}

impl From<StorageError> for WorkflowError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::Conflict(key) => {
				WorkflowError::Conflict(format!("concurrent update to {}", key))
			},
			other => WorkflowError::Storage(other.to_string()),
		}
	}
}

impl From<WorkflowError> for APIError {
	fn from(err: WorkflowError) -> Self {
		let message = err.to_string();
		match err {
			WorkflowError::NotFound { .. } => APIError::NotFound {
				error_type: "NOT_FOUND".to_string(),
				message,
			},
			WorkflowError::Unauthorized(_) => APIError::Forbidden {
				error_type: "UNAUTHORIZED".to_string(),
				message,
			},
			WorkflowError::Conflict(_) => APIError::Conflict {
				error_type: "CONFLICT".to_string(),
				message,
			},
			WorkflowError::Validation { .. } => APIError::BadRequest {
				error_type: "VALIDATION_ERROR".to_string(),
				message,
			},
			WorkflowError::Storage(_) => APIError::InternalServerError {
				error_type: "STORAGE_ERROR".to_string(),
				message: "Internal storage error".to_string(),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_api_status_mapping() {
		let cases = [
			(WorkflowError::not_found("order", "o1"), 404),
			(WorkflowError::Unauthorized("not the carrier".into()), 403),
			(WorkflowError::Conflict("order is ordered".into()), 409),
			(WorkflowError::invalid("rating", "must be between 1 and 5"), 400),
			(WorkflowError::Storage("disk full".into()), 500),
		];
		for (err, status) in cases {
			assert_eq!(APIError::from(err).status_code(), status);
		}
	}

	#[test]
	fn test_storage_details_not_exposed() {
		let api: APIError = WorkflowError::Storage("/var/data: permission denied".into()).into();
		assert!(!api.to_error_response().message.contains("/var/data"));
	}

	#[test]
	fn test_storage_error_mapping() {
		let err = WorkflowError::lookup("listing", "l1")(StorageError::NotFound);
		assert!(matches!(err, WorkflowError::NotFound { kind: "listing", ref id } if id == "l1"));

		let err = WorkflowError::commit("listing l1 was accepted concurrently")(
			StorageError::Conflict("listings:l1".into()),
		);
		assert!(matches!(err, WorkflowError::Conflict(msg) if msg.contains("concurrently")));

		let err: WorkflowError = StorageError::Backend("io".into()).into();
		assert!(matches!(err, WorkflowError::Storage(_)));
	}
}
