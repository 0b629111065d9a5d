//! String formatting utilities.
//!
//! Identifiers are UUIDs; logging them in full makes log lines hard to scan.

/// Shortens an identifier for log output.
///
/// Keeps the first 8 characters followed by ".." for longer ids. Splits on
/// character boundaries, so externally supplied ids never cause a panic.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((end, _)) => format!("{}..", &id[..end]),
		None => id.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_id() {
		assert_eq!(truncate_id("short"), "short");
		assert_eq!(truncate_id("12345678"), "12345678");
		assert_eq!(
			truncate_id("9b2f4c1e-7d3a-4f7e-9c55-1f2e3d4c5b6a"),
			"9b2f4c1e.."
		);
	}

	#[test]
	fn test_truncate_multibyte_id() {
		assert_eq!(truncate_id("带货华人网用户一二三"), "带货华人网用户一..");
	}
}
