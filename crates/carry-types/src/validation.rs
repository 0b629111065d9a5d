//! Configuration validation for implementation-specific TOML tables.
//!
//! Storage backends and notification sinks each receive a raw TOML table from
//! the configuration file. Every implementation declares a [`Schema`] for its
//! table so that typos and wrong types are reported at startup instead of
//! silently falling back to defaults.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
	/// A required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field is present that the schema does not know about.
	#[error("Unknown field: {0}")]
	UnknownField(String),
	/// A field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field has the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// The expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// A string restricted to a fixed set of values.
	OneOf(&'static [&'static str]),
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom check that receives the field value and returns an
	/// error message on failure.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of a flat TOML table.
///
/// Keys that are neither required nor optional are rejected.
#[derive(Debug, Default)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema.
	///
	/// # Errors
	///
	/// Returns the first problem found: a non-table root, a missing required
	/// field, an unknown field, a type mismatch, or a failed custom check.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for (key, value) in table {
			if self.required.iter().any(|f| &f.name == key) {
				continue;
			}
			match self.optional.iter().find(|f| &f.name == key) {
				Some(field) => field.check(value)?,
				None => return Err(ValidationError::UnknownField(key.clone())),
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn check_type(
	field: &str,
	value: &toml::Value,
	expected: &FieldType,
) -> Result<(), ValidationError> {
	match expected {
		FieldType::String => {
			value.as_str().ok_or_else(|| mismatch(field, "string", value))?;
		},
		FieldType::Boolean => {
			value.as_bool().ok_or_else(|| mismatch(field, "boolean", value))?;
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field, "integer", value))?;
			if let Some(min) = min.filter(|min| int_val < *min) {
				return Err(ValidationError::InvalidValue {
					field: field.to_string(),
					message: format!("Value {} is less than minimum {}", int_val, min),
				});
			}
			if let Some(max) = max.filter(|max| int_val > *max) {
				return Err(ValidationError::InvalidValue {
					field: field.to_string(),
					message: format!("Value {} is greater than maximum {}", int_val, max),
				});
			}
		},
		FieldType::OneOf(allowed) => {
			let s = value.as_str().ok_or_else(|| mismatch(field, "string", value))?;
			if !allowed.contains(&s) {
				return Err(ValidationError::InvalidValue {
					field: field.to_string(),
					message: format!("'{}' is not one of {}", s, allowed.join(", ")),
				});
			}
		},
	}

	Ok(())
}

/// A configuration schema that can validate a TOML table.
///
/// Implemented by each pluggable implementation so the service can check
/// its table before constructing it.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn table(src: &str) -> toml::Value {
		toml::from_str(src).unwrap()
	}

	fn schema() -> Schema {
		Schema::new(
			vec![Field::new("path", FieldType::String)
				.with_validator(|v| match v.as_str() {
					Some("") => Err("must not be empty".into()),
					_ => Ok(()),
				})],
			vec![
				Field::new(
					"capacity",
					FieldType::Integer {
						min: Some(1),
						max: Some(1024),
					},
				),
				Field::new("level", FieldType::OneOf(&["info", "debug"])),
			],
		)
	}

	#[test]
	fn test_accepts_valid_table() {
		let config = table("path = \"/tmp\"\ncapacity = 16\nlevel = \"debug\"");
		assert!(schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_required_field() {
		let result = schema().validate(&table("capacity = 16"));
		assert_eq!(result, Err(ValidationError::MissingField("path".into())));
	}

	#[test]
	fn test_unknown_field_rejected() {
		let result = schema().validate(&table("path = \"/tmp\"\ncapacty = 16"));
		assert_eq!(result, Err(ValidationError::UnknownField("capacty".into())));
	}

	#[test]
	fn test_bounds_and_choices() {
		assert!(matches!(
			schema().validate(&table("path = \"/tmp\"\ncapacity = 0")),
			Err(ValidationError::InvalidValue { .. })
		));
		assert!(matches!(
			schema().validate(&table("path = \"/tmp\"\nlevel = \"trace\"")),
			Err(ValidationError::InvalidValue { .. })
		));
		assert!(matches!(
			schema().validate(&table("path = 5")),
			Err(ValidationError::TypeMismatch { .. })
		));
	}

	#[test]
	fn test_custom_validator() {
		let result = schema().validate(&table("path = \"\""));
		assert!(matches!(result, Err(ValidationError::InvalidValue { field, .. }) if field == "path"));
	}
}
