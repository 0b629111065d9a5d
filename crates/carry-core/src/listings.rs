//! Listing store.
//!
//! Listings are published and deleted by their owners; the only other change
//! a listing ever sees is the open to accepted flip, which is never written
//! here directly but staged into the acceptance commit via [`ListingService::stage_accept`].

use crate::error::WorkflowError;
use carry_storage::{StorageService, Versioned, WriteBatch};
use carry_types::{current_timestamp, Listing, ListingId, ListingStatus, StorageKey, UserId};
use std::sync::Arc;

pub struct ListingService {
	storage: Arc<StorageService>,
}

impl ListingService {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Publishes a new open listing owned by `owner`.
	///
	/// `details` is opaque to the workflow but must be a JSON object.
	pub async fn publish(
		&self,
		owner: &UserId,
		details: serde_json::Value,
	) -> Result<Listing, WorkflowError> {
		if !details.is_object() {
			return Err(WorkflowError::invalid("details", "must be a JSON object"));
		}

		let listing = Listing {
			id: ListingId::generate(),
			owner_id: owner.clone(),
			details,
			status: ListingStatus::Open,
			created_at: current_timestamp(),
		};

		let mut batch = WriteBatch::new();
		batch.insert(StorageKey::Listings.as_str(), listing.id.as_str(), &listing)?;
		self.storage
			.commit(batch)
			.await
			.map_err(WorkflowError::commit("listing id collision"))?;

		tracing::info!(listing_id = %listing.id, owner_id = %owner, "Listing published");
		Ok(listing)
	}

	pub async fn get(&self, id: &ListingId) -> Result<Listing, WorkflowError> {
		self.get_versioned(id).await.map(Versioned::into_value)
	}

	pub async fn get_versioned(&self, id: &ListingId) -> Result<Versioned<Listing>, WorkflowError> {
		self.storage
			.retrieve_versioned(StorageKey::Listings.as_str(), id.as_str())
			.await
			.map_err(WorkflowError::lookup("listing", id))
	}

	pub async fn is_open(&self, id: &ListingId) -> Result<bool, WorkflowError> {
		Ok(self.get(id).await?.is_open())
	}

	/// Deletes a listing that has not been accepted yet.
	///
	/// Only the owner may delete, or an admin when `actor_is_admin` is set.
	pub async fn delete_if_open(
		&self,
		actor: &UserId,
		actor_is_admin: bool,
		id: &ListingId,
	) -> Result<(), WorkflowError> {
		let current = self.get_versioned(id).await?;
		if !current.value.is_owned_by(actor) && !actor_is_admin {
			return Err(WorkflowError::Unauthorized(format!(
				"only the owner may delete listing {}",
				id
			)));
		}
		if !current.value.is_open() {
			return Err(WorkflowError::Conflict(format!(
				"listing {} is {} and can no longer be deleted",
				id, current.value.status
			)));
		}

		let mut batch = WriteBatch::new();
		batch.remove(StorageKey::Listings.as_str(), id.as_str(), &current);
		self.storage
			.commit(batch)
			.await
			.map_err(WorkflowError::commit(format!("listing {} changed while deleting", id)))?;

		tracing::info!(listing_id = %id, actor_id = %actor, "Listing deleted");
		Ok(())
	}

	/// Adds the guarded open to accepted write for `listing` to `batch`.
	///
	/// The write only lands if the stored listing still equals what the caller read.
	pub fn stage_accept(
		&self,
		batch: &mut WriteBatch,
		listing: &Versioned<Listing>,
	) -> Result<(), WorkflowError> {
		let accepted = Listing {
			status: ListingStatus::Accepted,
			..listing.value.clone()
		};
		batch.replace(
			StorageKey::Listings.as_str(),
			listing.value.id.as_str(),
			listing,
			&accepted,
		)?;
		Ok(())
	}
}
