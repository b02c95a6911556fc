//! Facade over both lifecycle managers, the registry and the event bus.
//!
//! This is the surface the HTTP layer calls; every method maps to one
//! external operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};
use wa_protocol::{Ack, LifecycleEvent, LoginMode, StatusReport};
use wa_runtime::{CredentialStore, TransportEngine};

use crate::bus::{EventBus, LifecycleObserver, ObserverId};
use crate::error::{Error, Result};
use crate::lifecycle::{Collaborators, LifecycleManager, PairingOutcome, Timings};
use crate::phone::{PhoneNumber, recipient_jid};
use crate::qr::{DataUrlRenderer, QrRenderer};
use crate::registry::SessionRegistry;

/// Builder for [`Gateway`].
pub struct GatewayBuilder {
	engine: Arc<dyn TransportEngine>,
	store: Arc<dyn CredentialStore>,
	session_root: PathBuf,
	timings: Timings,
	renderer: Arc<dyn QrRenderer>,
}

impl GatewayBuilder {
	pub fn new(engine: Arc<dyn TransportEngine>, store: Arc<dyn CredentialStore>) -> Self {
		Self {
			engine,
			store,
			session_root: PathBuf::from("."),
			timings: Timings::default(),
			renderer: Arc::new(DataUrlRenderer),
		}
	}

	/// Directory holding one credential directory per mode.
	pub fn with_session_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.session_root = root.into();
		self
	}

	pub fn with_timings(mut self, timings: Timings) -> Self {
		self.timings = timings;
		self
	}

	pub fn with_renderer(mut self, renderer: Arc<dyn QrRenderer>) -> Self {
		self.renderer = renderer;
		self
	}

	pub fn build(self) -> Gateway {
		let registry = Arc::new(SessionRegistry::new());
		let bus = Arc::new(EventBus::new());
		let deps = Collaborators {
			engine: self.engine,
			store: self.store,
			registry: Arc::clone(&registry),
			bus: Arc::clone(&bus),
			renderer: self.renderer,
			timings: self.timings,
		};
		let manager = |mode: LoginMode| LifecycleManager::new(mode, self.session_root.join(mode.session_dir_name()), deps.clone());
		Gateway {
			qr: manager(LoginMode::Qr),
			pairing: manager(LoginMode::Pairing),
			registry,
			bus,
		}
	}
}

/// Entry point for every session operation.
#[derive(Clone)]
pub struct Gateway {
	qr: LifecycleManager,
	pairing: LifecycleManager,
	registry: Arc<SessionRegistry>,
	bus: Arc<EventBus>,
}

impl Gateway {
	pub fn builder(engine: Arc<dyn TransportEngine>, store: Arc<dyn CredentialStore>) -> GatewayBuilder {
		GatewayBuilder::new(engine, store)
	}

	pub fn manager(&self, mode: LoginMode) -> &LifecycleManager {
		match mode {
			LoginMode::Qr => &self.qr,
			LoginMode::Pairing => &self.pairing,
		}
	}

	pub fn registry(&self) -> &SessionRegistry {
		&self.registry
	}

	pub fn bus(&self) -> &EventBus {
		&self.bus
	}

	pub fn session_dir(&self, mode: LoginMode) -> &Path {
		self.manager(mode).session_dir()
	}

	pub async fn start_qr(&self) -> Result<Ack> {
		self.qr.start_qr().await?;
		Ok(Ack::ok("QR client started"))
	}

	/// Validates `raw` and runs a pairing attempt to settlement.
	pub async fn start_pairing(&self, raw: &str) -> Result<PairingOutcome> {
		let number = PhoneNumber::parse(raw)?;
		self.pairing.start_pairing(&number).await
	}

	/// Validates `raw`, then runs the pairing attempt in the background.
	///
	/// Failures of the background attempt are published as `error` events.
	pub fn spawn_pairing(&self, raw: &str) -> Result<Ack> {
		let number = PhoneNumber::parse(raw)?;
		let manager = self.pairing.clone();
		let bus = Arc::clone(&self.bus);
		tokio::spawn(async move {
			match manager.start_pairing(&number).await {
				Ok(outcome) => info!(target = "wa.lifecycle", outcome = ?outcome, "background pairing settled"),
				Err(Error::Superseded(_)) => info!(target = "wa.lifecycle", "background pairing superseded"),
				Err(e) => {
					warn!(target = "wa.lifecycle", error = %e, "background pairing failed");
					bus.publish(LifecycleEvent::Error {
						mode: LoginMode::Pairing,
						message: format!("Pairing process error: {e}"),
					});
				}
			}
		});
		Ok(Ack::ok("Pairing process started"))
	}

	/// Validates `raw`, opens a pairing connection and returns its code.
	pub async fn pair_direct(&self, raw: &str) -> Result<String> {
		let number = PhoneNumber::parse(raw)?;
		self.pairing.start_direct_pairing(&number).await
	}

	/// Sends `message` to `number` through the session of `mode` (`qr` when absent).
	pub async fn send_message(&self, number: &str, message: &str, mode: Option<&str>) -> Result<()> {
		let mode_name = mode.unwrap_or(LoginMode::Qr.as_str());
		let mode: LoginMode = mode_name.parse().map_err(|_| Error::BadMode(mode_name.to_string()))?;
		let handle = self.registry.get(mode).ok_or(Error::NotActive(mode))?;
		let jid = recipient_jid(number)?;
		handle.connection.send_text(&jid, message).await.map_err(Error::Transport)?;
		info!(target = "wa.lifecycle", mode = %mode, jid = %jid, "message sent");
		Ok(())
	}

	/// Logs out the session of the named mode.
	///
	/// An unknown mode name or a mode with no session is a [`Error::BadMode`].
	pub async fn logout(&self, mode_name: &str) -> Result<Ack> {
		let mode: LoginMode = mode_name.parse().map_err(|_| Error::BadMode(mode_name.to_string()))?;
		match self.manager(mode).logout().await {
			Ok(()) => Ok(Ack::ok(format!("{mode} client logged out"))),
			Err(Error::NotActive(_)) => Err(Error::BadMode(mode_name.to_string())),
			Err(e) => Err(e),
		}
	}

	pub fn status(&self) -> StatusReport {
		self.registry.status()
	}

	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.bus.subscribe()
	}

	pub fn add_observer(&self, observer: Arc<dyn LifecycleObserver>) -> ObserverId {
		self.bus.add_observer(observer)
	}
}
