//! Order fulfillment workflow for the carry-goods marketplace.
//!
//! A buyer publishes a listing asking for an item to be brought from abroad;
//! a carrier accepts it, which creates an order. Buyer and carrier then take
//! turns advancing the order: the carrier gives a shipping address, the buyer
//! reports a tracking number, the carrier posts arrival information, and the
//! buyer confirms receipt with a rating.
//!
//! [`WorkflowEngine`] is the entry point. It is assembled from configuration
//! by [`MarketplaceBuilder`] or directly with [`WorkflowEngine::new`].

pub mod builder;
pub mod engine;
pub mod error;
pub mod listings;
pub mod notifications;
pub mod state;
pub mod users;
pub mod view;

pub use builder::{BuilderError, MarketplaceBuilder, MarketplaceFactories};
pub use engine::{event_bus::EventBus, WorkflowEngine};
pub use error::WorkflowError;
pub use notifications::{NotificationSink, NotifyError};
pub use users::{DirectoryError, UserDirectory};
