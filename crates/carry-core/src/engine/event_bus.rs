//! In-process broadcast of workflow events.

use carry_types::WorkflowEvent;
use tokio::sync::broadcast;

/// Fan-out channel for [`WorkflowEvent`]s.
///
/// Cloning yields another handle to the same channel. Subscribers that fall
/// more than `capacity` events behind skip the oldest ones.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event, returning how many subscribers received it.
	///
	/// Errors only when nobody is subscribed.
	pub fn publish(
		&self,
		event: WorkflowEvent,
	) -> Result<usize, broadcast::error::SendError<WorkflowEvent>> {
		self.sender.send(event)
	}
}
