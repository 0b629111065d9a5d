//! File-based storage backend.
//!
//! Each key is stored as its own file under a base directory. Every operation
//! runs under a directory lock made of an in-process mutex and an exclusive
//! advisory lock on a lock file, so separate processes sharing the directory
//! are serialized as well. Batch commits are written to a journal first and
//! then applied, which lets an interrupted batch be finished on the next
//! access instead of leaving half of it on disk.
//!
//! File names are the hex encoding of the key, or a SHA3-256 digest of it when
//! the encoding would be too long for a file name. Each record also carries
//! its full key, so a read can tell its own record from anything else.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry, Write, WriteBatch};
use async_trait::async_trait;
use carry_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};

const LOCK_FILE: &str = ".lock";
const JOURNAL_FILE: &str = "batch.journal";
const DEFAULT_STORAGE_PATH: &str = "./data/storage";
/// Longest hex-encoded key used verbatim as a file name.
const MAX_ENCODED_KEY_LEN: usize = 200;

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size record header.
///
/// Binary layout (16 bytes total), followed by the key and then the payload:
/// - [0-3]: Magic bytes "CRYS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-9]: Key length in bytes (u32, little-endian)
/// - [10-15]: Reserved
struct FileHeader;

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"CRYS";
	const VERSION: u16 = 1;
	const SIZE: usize = 16;

	fn encode(key: &str, payload: &[u8]) -> Result<Vec<u8>, StorageError> {
		let key_len = u32::try_from(key.len())
			.map_err(|_| StorageError::Backend(format!("Key too long: {} bytes", key.len())))?;
		let mut bytes = Vec::with_capacity(Self::SIZE + key.len() + payload.len());
		bytes.extend_from_slice(Self::MAGIC);
		bytes.extend_from_slice(&Self::VERSION.to_le_bytes());
		bytes.extend_from_slice(&key_len.to_le_bytes());
		bytes.resize(Self::SIZE, 0);
		bytes.extend_from_slice(key.as_bytes());
		bytes.extend_from_slice(payload);
		Ok(bytes)
	}

	/// Returns the payload, or an error when the file is not a record for `key`.
	fn decode(key: &str, mut data: Vec<u8>) -> Result<Vec<u8>, StorageError> {
		if data.len() < Self::SIZE || &data[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Unrecognized file format".into()));
		}
		let version = u16::from_le_bytes([data[4], data[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}
		let key_len = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
		let key_end = Self::SIZE.saturating_add(key_len);
		if data.get(Self::SIZE..key_end) != Some(key.as_bytes()) {
			return Err(StorageError::Backend(format!(
				"File for key {} holds a different key",
				key
			)));
		}
		Ok(data.split_off(key_end))
	}
}

/// Maps a key to its file name, one to one for all practical purposes.
fn file_name(key: &str) -> String {
	let encoded = hex::encode(key.as_bytes());
	if encoded.len() <= MAX_ENCODED_KEY_LEN {
		format!("k{}.bin", encoded)
	} else {
		format!("h{}.bin", hex::encode(Sha3_256::digest(key.as_bytes())))
	}
}

/// One staged mutation as recorded in the journal. `None` deletes.
#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
	key: String,
	value: Option<Vec<u8>>,
}

impl From<Write> for JournalEntry {
	fn from(write: Write) -> Self {
		match write {
			Write::Put { key, value } => Self {
				key,
				value: Some(value),
			},
			Write::Delete { key } => Self { key, value: None },
		}
	}
}

/// Held for the duration of one storage operation.
struct DirectoryLock<'a> {
	_guard: MutexGuard<'a, ()>,
	file: std::fs::File,
}

impl Drop for DirectoryLock<'_> {
	fn drop(&mut self) {
		if let Err(e) = FileExt::unlock(&self.file) {
			tracing::warn!("Failed to release storage lock: {}", e);
		}
	}
}

fn backend(e: impl std::fmt::Display) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Serializes operations from this process before taking the file lock.
	mutex: Mutex<()>,
}

impl FileStorage {
	/// Creates a new FileStorage rooted at `base_path`.
	///
	/// The directory is created lazily on first access.
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			mutex: Mutex::new(()),
		}
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		self.base_path.join(file_name(key))
	}

	async fn lock(&self) -> Result<DirectoryLock<'_>, StorageError> {
		let guard = self.mutex.lock().await;
		fs::create_dir_all(&self.base_path).await.map_err(backend)?;

		let lock_path = self.base_path.join(LOCK_FILE);
		let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
			let file = std::fs::OpenOptions::new()
				.create(true)
				.read(true)
				.write(true)
				.truncate(false)
				.open(&lock_path)?;
			FileExt::lock_exclusive(&file)?;
			Ok(file)
		})
		.await
		.map_err(backend)?
		.map_err(backend)?;

		let lock = DirectoryLock {
			_guard: guard,
			file,
		};
		self.replay_journal().await?;
		Ok(lock)
	}

	/// Finishes a batch left behind by an interrupted commit.
	///
	/// Must be called with the directory lock held.
	async fn replay_journal(&self) -> Result<(), StorageError> {
		let journal_path = self.base_path.join(JOURNAL_FILE);
		let data = match fs::read(&journal_path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
			Err(e) => return Err(backend(e)),
		};
		let entries: Vec<JournalEntry> =
			serde_json::from_slice(&data).map_err(|e| StorageError::Serialization(e.to_string()))?;

		tracing::info!(
			"Replaying {} journaled write(s) in {}",
			entries.len(),
			self.base_path.display()
		);
		self.apply(&entries).await?;
		remove_if_present(&journal_path).await
	}

	async fn write_journal(&self, entries: &[JournalEntry]) -> Result<(), StorageError> {
		let data =
			serde_json::to_vec(entries).map_err(|e| StorageError::Serialization(e.to_string()))?;
		write_atomic(&self.base_path.join(JOURNAL_FILE), &data).await
	}

	async fn apply(&self, entries: &[JournalEntry]) -> Result<(), StorageError> {
		for entry in entries {
			let path = self.get_file_path(&entry.key);
			match &entry.value {
				Some(value) => write_atomic(&path, &FileHeader::encode(&entry.key, value)?).await?,
				None => remove_if_present(&path).await?,
			}
		}
		Ok(())
	}

	async fn read_current(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
		match fs::read(self.get_file_path(key)).await {
			Ok(data) => FileHeader::decode(key, data).map(Some),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(backend(e)),
		}
	}
}

/// Writes a sibling temp file, syncs it, and renames it into place.
///
/// The parent directory is synced after the rename so the new entry itself
/// is durable.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
	let temp_path = path.with_extension("tmp");
	let mut file = fs::File::create(&temp_path).await.map_err(backend)?;
	file.write_all(data).await.map_err(backend)?;
	file.sync_all().await.map_err(backend)?;
	drop(file);

	fs::rename(&temp_path, path).await.map_err(backend)?;
	sync_parent(path).await
}

#[cfg(unix)]
async fn sync_parent(path: &Path) -> Result<(), StorageError> {
	let Some(parent) = path.parent() else {
		return Ok(());
	};
	fs::File::open(parent)
		.await
		.map_err(backend)?
		.sync_all()
		.await
		.map_err(backend)
}

// Directories cannot be opened for syncing here.
#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> Result<(), StorageError> {
	Ok(())
}

async fn remove_if_present(path: &Path) -> Result<(), StorageError> {
	match fs::remove_file(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(backend(e)),
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let _lock = self.lock().await?;
		self.read_current(key).await?.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let _lock = self.lock().await?;
		write_atomic(&self.get_file_path(key), &FileHeader::encode(key, &value)?).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let _lock = self.lock().await?;
		remove_if_present(&self.get_file_path(key)).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let _lock = self.lock().await?;
		Ok(self.read_current(key).await?.is_some())
	}

	async fn commit(&self, batch: WriteBatch) -> Result<(), StorageError> {
		let (guards, writes) = batch.into_parts();
		let _lock = self.lock().await?;

		for guard in &guards {
			let current = self.read_current(&guard.key).await?;
			if !guard.holds(current.as_deref()) {
				return Err(StorageError::Conflict(guard.key.clone()));
			}
		}

		let entries: Vec<JournalEntry> = writes.into_iter().map(JournalEntry::from).collect();
		self.write_journal(&entries).await?;
		self.apply(&entries).await?;
		remove_if_present(&self.base_path.join(JOURNAL_FILE)).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|v| {
					match v.as_str().map(str::trim) {
						Some("") => Err("storage_path cannot be empty".into()),
						_ => Ok(()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
