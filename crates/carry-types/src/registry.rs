//! Registry trait for self-registering implementations.
//!
//! Pluggable components (storage backends, notification sinks) expose a
//! `Registry` type implementing this trait so the service can build a
//! name → factory table without hard-coding each implementation.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "memory" for `[storage.implementations.memory]` or "log" for
	/// `[notifications.implementations.log]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
