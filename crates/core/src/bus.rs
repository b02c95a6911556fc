//! Fan-out of lifecycle events to observers.
//!
//! Two kinds of subscriber are supported: synchronous [`LifecycleObserver`]s
//! called inline on publish, and async [`broadcast`] receivers from
//! [`EventBus::subscribe`]. There is no replay; a receiver only sees events
//! published after it subscribed.

use std::error::Error as StdError;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use wa_protocol::LifecycleEvent;

const CHANNEL_CAPACITY: usize = 64;

/// Failure reported by an observer; logged and otherwise ignored.
pub type ObserverError = Box<dyn StdError + Send + Sync>;

/// Synchronous event sink.
pub trait LifecycleObserver: Send + Sync {
	fn on_event(&self, event: &LifecycleEvent) -> Result<(), ObserverError>;
}

impl<F> LifecycleObserver for F
where
	F: Fn(&LifecycleEvent) -> Result<(), ObserverError> + Send + Sync,
{
	fn on_event(&self, event: &LifecycleEvent) -> Result<(), ObserverError> {
		self(event)
	}
}

/// Handle returned by [`EventBus::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

struct Registered {
	id: ObserverId,
	observer: Arc<dyn LifecycleObserver>,
}

/// Broadcaster of [`LifecycleEvent`]s. Holds no per-observer state beyond registration.
pub struct EventBus {
	sender: broadcast::Sender<LifecycleEvent>,
	observers: RwLock<Vec<Registered>>,
	next_id: AtomicUsize,
}

impl EventBus {
	pub fn new() -> Self {
		let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
		Self {
			sender,
			observers: RwLock::new(Vec::new()),
			next_id: AtomicUsize::new(0),
		}
	}

	/// Delivers `event` once to every observer and receiver.
	///
	/// An observer that errors or panics is logged and skipped; the rest still
	/// receive the event.
	pub fn publish(&self, event: LifecycleEvent) {
		debug!(target = "wa.bus", event = event.name(), "publish");

		let observers: Vec<(ObserverId, Arc<dyn LifecycleObserver>)> = self
			.observers
			.read()
			.iter()
			.map(|r| (r.id, Arc::clone(&r.observer)))
			.collect();

		for (id, observer) in observers {
			match catch_unwind(AssertUnwindSafe(|| observer.on_event(&event))) {
				Ok(Ok(())) => {}
				Ok(Err(e)) => warn!(target = "wa.bus", observer = id.0, error = %e, "observer failed"),
				Err(_) => warn!(target = "wa.bus", observer = id.0, "observer panicked"),
			}
		}

		// No receivers is fine.
		let _ = self.sender.send(event);
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.sender.subscribe()
	}

	pub fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) -> ObserverId {
		let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
		self.observers.write().push(Registered { id, observer });
		id
	}

	pub fn remove_observer(&self, id: ObserverId) -> bool {
		let mut observers = self.observers.write();
		let before = observers.len();
		observers.retain(|r| r.id != id);
		observers.len() < before
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}
