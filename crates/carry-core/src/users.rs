//! User directory.
//!
//! The workflow only needs to know whether an acting user exists and whether
//! they are an admin. Account management beyond registration is out of scope.

use crate::error::WorkflowError;
use async_trait::async_trait;
use carry_storage::{StorageError, StorageService, WriteBatch};
use carry_types::{current_timestamp, StorageKey, User, UserId};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
	#[error("Username '{0}' is already taken")]
	UsernameTaken(String),
	#[error("Invalid username: {0}")]
	InvalidUsername(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for DirectoryError {
	fn from(err: StorageError) -> Self {
		DirectoryError::Storage(err.to_string())
	}
}

impl From<DirectoryError> for WorkflowError {
	fn from(err: DirectoryError) -> Self {
		match err {
			DirectoryError::UsernameTaken(name) => {
				WorkflowError::Conflict(format!("username '{}' is already taken", name))
			},
			DirectoryError::InvalidUsername(message) => WorkflowError::invalid("username", message),
			DirectoryError::Storage(message) => WorkflowError::Storage(message),
		}
	}
}

/// Lookup and registration of marketplace users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
	async fn get(&self, user_id: &UserId) -> Result<Option<User>, DirectoryError>;

	async fn exists(&self, user_id: &UserId) -> Result<bool, DirectoryError> {
		Ok(self.get(user_id).await?.is_some())
	}

	/// Creates a user with a unique username.
	async fn register(&self, username: &str, is_admin: bool) -> Result<User, DirectoryError>;
}

/// [`UserDirectory`] backed by the marketplace storage.
///
/// Usernames are unique case-insensitively through a name index written in
/// the same commit as the user record.
pub struct StorageUserDirectory {
	storage: Arc<StorageService>,
}

impl StorageUserDirectory {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}
}

#[async_trait]
impl UserDirectory for StorageUserDirectory {
	async fn get(&self, user_id: &UserId) -> Result<Option<User>, DirectoryError> {
		match self
			.storage
			.retrieve(StorageKey::Users.as_str(), user_id.as_str())
			.await
		{
			Ok(user) => Ok(Some(user)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	async fn register(&self, username: &str, is_admin: bool) -> Result<User, DirectoryError> {
		let username = username.trim();
		if username.is_empty() {
			return Err(DirectoryError::InvalidUsername("must not be blank".into()));
		}
		if username.chars().any(char::is_control) {
			return Err(DirectoryError::InvalidUsername(
				"must not contain control characters".into(),
			));
		}

		let user = User {
			id: UserId::generate(),
			username: username.to_string(),
			is_admin,
			created_at: current_timestamp(),
		};

		let mut batch = WriteBatch::new();
		batch.insert(
			StorageKey::UserByName.as_str(),
			&username.to_lowercase(),
			&user.id,
		)?;
		batch.insert(StorageKey::Users.as_str(), user.id.as_str(), &user)?;

		match self.storage.commit(batch).await {
			Ok(()) => {
				tracing::info!(user_id = %user.id, username = %user.username, "User registered");
				Ok(user)
			},
			Err(StorageError::Conflict(_)) => {
				Err(DirectoryError::UsernameTaken(username.to_string()))
			},
			Err(e) => Err(e.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use carry_storage::implementations::memory::MemoryStorage;

	fn directory() -> StorageUserDirectory {
		StorageUserDirectory::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	#[tokio::test]
	async fn test_register_and_lookup() {
		let users = directory();
		let user = users.register("  alice ", false).await.unwrap();
		assert_eq!(user.username, "alice");
		assert!(!user.is_admin);

		assert!(users.exists(&user.id).await.unwrap());
		assert_eq!(users.get(&user.id).await.unwrap().unwrap().username, "alice");
		assert!(!users.exists(&UserId::new("ghost")).await.unwrap());
	}

	#[tokio::test]
	async fn test_usernames_are_unique_ignoring_case() {
		let users = directory();
		users.register("Bob", false).await.unwrap();

		let result = users.register("bob", false).await;
		assert!(matches!(result, Err(DirectoryError::UsernameTaken(_))));
	}

	#[tokio::test]
	async fn test_blank_username_rejected() {
		let users = directory();
		let result = users.register("   ", false).await;
		assert!(matches!(result, Err(DirectoryError::InvalidUsername(_))));

		let err: WorkflowError = result.unwrap_err().into();
		assert!(matches!(err, WorkflowError::Validation { field: "username", .. }));
	}

	#[tokio::test]
	async fn test_file_backend_keeps_similar_and_long_names_apart() {
		let dir = tempfile::TempDir::new().unwrap();
		let users = StorageUserDirectory::new(Arc::new(StorageService::new(Box::new(
			carry_storage::implementations::file::FileStorage::new(dir.path().to_path_buf()),
		))));

		users.register("a:b", false).await.unwrap();
		users.register("a_b", false).await.unwrap();
		users.register("a/b", false).await.unwrap();

		let long_name = "n".repeat(300);
		let user = users.register(&long_name, false).await.unwrap();
		assert_eq!(users.get(&user.id).await.unwrap().unwrap().username, long_name);
		assert!(matches!(
			users.register(&long_name.to_uppercase(), false).await,
			Err(DirectoryError::UsernameTaken(_))
		));
	}
}
