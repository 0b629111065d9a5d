//! Storage module for the carry marketplace.
//!
//! This module provides a key-value abstraction over persistent storage with
//! one capability beyond plain get/set: guarded batch commits. A batch carries
//! preconditions on the current bytes of some keys plus a set of writes, and a
//! backend applies the writes only if every precondition still holds, as one
//! atomic unit. The order workflow builds its compare-and-set transitions and
//! its listing/order pairing on top of this.

use async_trait::async_trait;
use carry_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// A batch precondition no longer held; nothing was written.
	#[error("Precondition failed for key '{0}'")]
	Conflict(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Builds the backend key for a record.
pub fn storage_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

/// A precondition on the current value of a key.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
	pub key: String,
	/// `None` means the key must be absent.
	pub expected: Option<Vec<u8>>,
}

impl Guard {
	/// Whether the guard holds against the key's current bytes.
	pub fn holds(&self, current: Option<&[u8]>) -> bool {
		self.expected.as_deref() == current
	}
}

/// A single mutation inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
	Put { key: String, value: Vec<u8> },
	Delete { key: String },
}

impl Write {
	pub fn key(&self) -> &str {
		match self {
			Write::Put { key, .. } | Write::Delete { key } => key,
		}
	}
}

/// A set of guarded writes applied all-or-nothing by [`StorageInterface::commit`].
#[derive(Debug, Default)]
pub struct WriteBatch {
	guards: Vec<Guard>,
	writes: Vec<Write>,
}

impl WriteBatch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Requires `key` to be absent at commit time.
	pub fn guard_absent(&mut self, key: impl Into<String>) {
		self.guards.push(Guard {
			key: key.into(),
			expected: None,
		});
	}

	/// Requires `key` to hold exactly `bytes` at commit time.
	pub fn guard_equals(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
		self.guards.push(Guard {
			key: key.into(),
			expected: Some(bytes),
		});
	}

	pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
		self.writes.push(Write::Put {
			key: key.into(),
			value,
		});
	}

	pub fn delete(&mut self, key: impl Into<String>) {
		self.writes.push(Write::Delete { key: key.into() });
	}

	/// Stages a new record that must not exist yet.
	pub fn insert<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = storage_key(namespace, id);
		self.guard_absent(key.clone());
		self.put(key, encode(data)?);
		Ok(())
	}

	/// Stages an overwrite of a record that must still equal `current`.
	pub fn replace<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		current: &Versioned<T>,
		data: &T,
	) -> Result<(), StorageError> {
		let key = storage_key(namespace, id);
		self.guard_equals(key.clone(), current.bytes.clone());
		self.put(key, encode(data)?);
		Ok(())
	}

	/// Stages removal of a record that must still equal `current`.
	pub fn remove<T>(&mut self, namespace: &str, id: &str, current: &Versioned<T>) {
		let key = storage_key(namespace, id);
		self.guard_equals(key.clone(), current.bytes.clone());
		self.delete(key);
	}

	pub fn is_empty(&self) -> bool {
		self.guards.is_empty() && self.writes.is_empty()
	}

	pub fn into_parts(self) -> (Vec<Guard>, Vec<Write>) {
		(self.guards, self.writes)
	}
}

/// A decoded record together with the exact bytes it was read from.
///
/// Passing it back into [`WriteBatch::replace`] turns the write into a
/// compare-and-set against what the caller saw.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
	pub value: T,
	bytes: Vec<u8>,
}

impl<T> Versioned<T> {
	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn into_value(self) -> T {
		self.value
	}
}

fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
	serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the marketplace. Besides basic key-value operations it
/// requires atomic guarded batch commits.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes unconditionally.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Applies every write in `batch` if and only if every guard holds.
	///
	/// Returns `StorageError::Conflict` naming the first failing key when a
	/// guard does not hold; in that case nothing is written. Concurrent
	/// commits touching the same keys must be serialized by the backend.
	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level storage service that provides typed operations.
///
/// Wraps a low-level backend and serializes records as JSON under
/// `namespace:id` keys.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.backend
			.set_bytes(&storage_key(namespace, id), encode(data)?)
			.await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		self.retrieve_versioned(namespace, id)
			.await
			.map(Versioned::into_value)
	}

	/// Retrieves a value together with the bytes it was decoded from.
	pub async fn retrieve_versioned<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Versioned<T>, StorageError> {
		let bytes = self.backend.get_bytes(&storage_key(namespace, id)).await?;
		let value =
			serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
		Ok(Versioned { value, bytes })
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&storage_key(namespace, id)).await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&storage_key(namespace, id)).await
	}

	/// Applies a guarded batch atomically.
	pub async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
		if batch.is_empty() {
			return Ok(());
		}
		self.backend.commit(batch).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;
	use serde::Deserialize;

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Record {
		name: String,
		version: u32,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_store_and_retrieve() {
		let storage = service();
		let record = Record {
			name: "a".into(),
			version: 1,
		};
		storage.store("records", "1", &record).await.unwrap();

		let loaded: Record = storage.retrieve("records", "1").await.unwrap();
		assert_eq!(loaded, record);
		assert!(storage.exists("records", "1").await.unwrap());

		storage.remove("records", "1").await.unwrap();
		let result = storage.retrieve::<Record>("records", "1").await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_replace_is_compare_and_set() {
		let storage = service();
		let v1 = Record {
			name: "a".into(),
			version: 1,
		};
		storage.store("records", "1", &v1).await.unwrap();

		let seen: Versioned<Record> = storage.retrieve_versioned("records", "1").await.unwrap();

		let mut first = WriteBatch::new();
		let v2 = Record {
			version: 2,
			..seen.value.clone()
		};
		first.replace("records", "1", &seen, &v2).unwrap();
		storage.commit(first).await.unwrap();

		// A second writer holding the same stale read loses.
		let mut second = WriteBatch::new();
		let v3 = Record {
			version: 3,
			..seen.value.clone()
		};
		second.replace("records", "1", &seen, &v3).unwrap();
		let result = storage.commit(second).await;
		assert!(matches!(result, Err(StorageError::Conflict(key)) if key == "records:1"));

		let current: Record = storage.retrieve("records", "1").await.unwrap();
		assert_eq!(current, v2);
	}

	#[tokio::test]
	async fn test_failed_batch_writes_nothing() {
		let storage = service();
		storage.store("records", "taken", &1u32).await.unwrap();

		let mut batch = WriteBatch::new();
		batch.insert("records", "fresh", &2u32).unwrap();
		batch.insert("records", "taken", &3u32).unwrap();
		assert!(matches!(
			storage.commit(batch).await,
			Err(StorageError::Conflict(_))
		));

		assert!(!storage.exists("records", "fresh").await.unwrap());
		let taken: u32 = storage.retrieve("records", "taken").await.unwrap();
		assert_eq!(taken, 1);
	}

	#[tokio::test]
	async fn test_guarded_remove() {
		let storage = service();
		storage.store("records", "1", &"x").await.unwrap();
		let seen: Versioned<String> = storage.retrieve_versioned("records", "1").await.unwrap();

		let mut batch = WriteBatch::new();
		batch.remove("records", "1", &seen);
		storage.commit(batch).await.unwrap();
		assert!(!storage.exists("records", "1").await.unwrap());
	}
}
