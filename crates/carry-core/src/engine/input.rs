//! Normalization of user supplied transition input.

use crate::error::WorkflowError;

pub(crate) const MIN_RATING: i64 = 1;
pub(crate) const MAX_RATING: i64 = 5;

/// Trims `value`; blank counts as missing.
pub(crate) fn required_text(field: &'static str, value: &str) -> Result<String, WorkflowError> {
	match value.trim() {
		"" => Err(WorkflowError::invalid(field, "is required")),
		trimmed => Ok(trimmed.to_string()),
	}
}

/// Trims `value`; blank is stored as absent.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
	value
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(str::to_string)
}

pub(crate) fn rating(value: i64) -> Result<u8, WorkflowError> {
	if !(MIN_RATING..=MAX_RATING).contains(&value) {
		return Err(WorkflowError::invalid(
			"rating",
			format!(
				"must be between {} and {}, got {}",
				MIN_RATING, MAX_RATING, value
			),
		));
	}
	u8::try_from(value).map_err(|e| WorkflowError::invalid("rating", e.to_string()))
}
