//! Per-mode connection lifecycle manager.
//!
//! Each start call opens a fresh connection and spawns an [`AttemptDriver`]
//! that feeds the connection's events, its timers and its background code
//! request into the pure [`Attempt`] machine, then carries out the returned
//! effects. Every driver owns a cancellation token; starting again or logging
//! out cancels the previous driver so it cannot act on the newer attempt.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wa_protocol::{ConnectionPhase, ConnectionUpdate, CredentialUpdate, LifecycleEvent, LoginMode};
use wa_runtime::{Connection, CredentialStore, EngineEvent, PersistFn, TransportEngine};

use super::machine::{Attempt, AttemptKind, Effect, Input, Settlement, logged_out_reason};
use super::policy::{Timings, socket_config};
use crate::bus::EventBus;
use crate::error::{Error, Result};
use crate::phone::PhoneNumber;
use crate::qr::QrRenderer;
use crate::registry::SessionRegistry;
use crate::session::SessionHandle;

/// How a pairing start resolved successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
	/// The session reached the open state.
	Authenticated,
	/// The code was delivered and the grace period passed without authentication.
	CodeIssued { code: String },
}

/// Shared collaborators handed to each manager.
#[derive(Clone)]
pub struct Collaborators {
	pub engine: Arc<dyn TransportEngine>,
	pub store: Arc<dyn CredentialStore>,
	pub registry: Arc<SessionRegistry>,
	pub bus: Arc<EventBus>,
	pub renderer: Arc<dyn QrRenderer>,
	pub timings: Timings,
}

/// Owns the connection lifecycle of one login mode.
#[derive(Clone)]
pub struct LifecycleManager {
	inner: Arc<Inner>,
}

struct Inner {
	mode: LoginMode,
	session_dir: PathBuf,
	deps: Collaborators,
	/// Serializes start and logout for this mode.
	start_lock: tokio::sync::Mutex<()>,
	active: parking_lot::Mutex<Option<ActiveAttempt>>,
	next_attempt: AtomicU64,
	/// Bumped by every start and logout; a scheduled restart only runs if it is unchanged.
	epoch: AtomicU64,
}

struct ActiveAttempt {
	id: u64,
	cancel: CancellationToken,
	connection: Arc<dyn Connection>,
}

struct Started {
	id: u64,
	connection: Arc<dyn Connection>,
	settled: oneshot::Receiver<Settlement>,
}

impl LifecycleManager {
	pub fn new(mode: LoginMode, session_dir: impl Into<PathBuf>, deps: Collaborators) -> Self {
		Self {
			inner: Arc::new(Inner {
				mode,
				session_dir: session_dir.into(),
				deps,
				start_lock: tokio::sync::Mutex::new(()),
				active: parking_lot::Mutex::new(None),
				next_attempt: AtomicU64::new(0),
				epoch: AtomicU64::new(0),
			}),
		}
	}

	pub fn mode(&self) -> LoginMode {
		self.inner.mode
	}

	pub fn session_dir(&self) -> &Path {
		&self.inner.session_dir
	}

	pub fn is_active(&self) -> bool {
		self.inner.deps.registry.is_active(self.inner.mode)
	}

	/// Opens a QR connection and returns as soon as the engine accepts it.
	///
	/// QR payloads, authentication and disconnects arrive on the event bus.
	pub async fn start_qr(&self) -> Result<()> {
		self.begin(AttemptKind::Qr, None).await.map(|_| ())
	}

	/// Opens a pairing connection and waits for the attempt to settle.
	///
	/// Resolves on authentication, or once the code was delivered and the
	/// grace period passed. Rejects on the hard deadline, on a close before a
	/// code was requested, or when the code request fails.
	pub async fn start_pairing(&self, number: &PhoneNumber) -> Result<PairingOutcome> {
		self.pair(number.as_str().to_string()).await
	}

	/// Opens a pairing connection and requests the code immediately.
	///
	/// The connection keeps running afterwards; it is installed on open and
	/// never reconnects.
	pub async fn start_direct_pairing(&self, number: &PhoneNumber) -> Result<String> {
		let started = self.begin(AttemptKind::DirectPairing, None).await?;
		match started.connection.request_pairing_code(number.as_str()).await {
			Ok(code) => {
				info!(target = "wa.lifecycle", mode = %self.inner.mode, attempt = started.id, "direct pairing code received");
				self.inner.deps.bus.publish(LifecycleEvent::PairingCode { code: code.clone() });
				Ok(code)
			}
			Err(e) => {
				warn!(target = "wa.lifecycle", mode = %self.inner.mode, attempt = started.id, error = %e, "direct pairing code failed");
				self.inner.abandon(started.id);
				Err(Error::PairingCode(rpc_message(&e)))
			}
		}
	}

	/// Logs the installed session out and clears its slot.
	pub async fn logout(&self) -> Result<()> {
		let inner = &self.inner;
		let _guard = inner.start_lock.lock().await;

		let Some(handle) = inner.deps.registry.get(inner.mode) else {
			return Err(Error::NotActive(inner.mode));
		};
		inner.epoch.fetch_add(1, Ordering::SeqCst);
		let active = inner.active.lock().take();
		if let Some(active) = active {
			active.cancel.cancel();
		}

		// No driver watches this connection any more, so a failed logout drops the session.
		if let Err(e) = handle.connection.logout().await {
			warn!(target = "wa.lifecycle", mode = %inner.mode, attempt = handle.attempt, error = %e, "logout failed, dropping session");
			inner.deps.registry.clear_if(inner.mode, handle.attempt);
			handle.connection.close();
			inner.deps.bus.publish(LifecycleEvent::Error {
				mode: inner.mode,
				message: format!("Logout failed: {}", rpc_message(&e)),
			});
			return Err(Error::Transport(e));
		}
		inner.deps.registry.clear_if(inner.mode, handle.attempt);
		inner.deps.bus.publish(LifecycleEvent::Disconnected {
			mode: inner.mode,
			reason: logged_out_reason(inner.mode).to_string(),
		});
		info!(target = "wa.lifecycle", mode = %inner.mode, attempt = handle.attempt, "logged out");
		Ok(())
	}

	async fn pair(&self, number: String) -> Result<PairingOutcome> {
		let timings = self.inner.deps.timings;
		let deadline = Instant::now() + timings.pairing_deadline;
		let started = self.begin(AttemptKind::Pairing { number }, Some(deadline)).await?;
		match started.settled.await {
			Ok(Settlement::Authenticated) => Ok(PairingOutcome::Authenticated),
			Ok(Settlement::CodeIssued(code)) => Ok(PairingOutcome::CodeIssued { code }),
			Ok(Settlement::Closed(status)) => Err(Error::Closed { status }),
			Ok(Settlement::CodeFailed(message)) => Err(Error::PairingCode(message)),
			Ok(Settlement::TimedOut) => Err(Error::Timeout {
				after: timings.pairing_deadline,
			}),
			Err(_) => Err(Error::Superseded(self.inner.mode)),
		}
	}

	/// Tears down the previous attempt and session, then opens a new connection and spawns its driver.
	async fn begin(&self, kind: AttemptKind, deadline: Option<Instant>) -> Result<Started> {
		let inner = &self.inner;
		if kind.mode() != inner.mode {
			return Err(Error::BadMode(kind.mode().to_string()));
		}
		let _guard = inner.start_lock.lock().await;
		inner.epoch.fetch_add(1, Ordering::SeqCst);
		inner.teardown().await;

		let loaded = inner.deps.store.load(&inner.session_dir).map_err(Error::Credentials)?;
		let config = socket_config(&kind, &inner.deps.timings);
		let opened = inner
			.deps
			.engine
			.open(config, loaded.state)
			.await
			.map_err(|source| Error::Start { mode: inner.mode, source })?;

		let id = inner.next_attempt.fetch_add(1, Ordering::SeqCst) + 1;
		let cancel = CancellationToken::new();
		*inner.active.lock() = Some(ActiveAttempt {
			id,
			cancel: cancel.clone(),
			connection: Arc::clone(&opened.connection),
		});
		info!(target = "wa.lifecycle", mode = %inner.mode, attempt = id, kind = ?kind, "connection opened");

		let (settle_tx, settled) = oneshot::channel();
		let (internal_tx, internal_rx) = mpsc::unbounded_channel();
		let driver = AttemptDriver {
			manager: self.clone(),
			id,
			attempt: Attempt::new(kind),
			connection: Arc::clone(&opened.connection),
			events: opened.events,
			events_open: true,
			persist: loaded.persist,
			cancel,
			settle: Some(settle_tx),
			internal_tx,
			internal_rx,
			code_at: None,
			grace_at: None,
			deadline,
		};
		tokio::spawn(driver.run());

		Ok(Started {
			id,
			connection: opened.connection,
			settled,
		})
	}
}

impl Inner {
	/// Cancels the running attempt, logs out the installed session and closes the old connection.
	///
	/// Logout failure is expected when there was never a live session and is only logged.
	async fn teardown(&self) {
		let previous = self.active.lock().take();
		if let Some(previous) = &previous {
			debug!(target = "wa.lifecycle", mode = %self.mode, attempt = previous.id, "cancelling previous attempt");
			previous.cancel.cancel();
		}

		if let Some(handle) = self.deps.registry.clear(self.mode) {
			if let Err(e) = handle.connection.logout().await {
				info!(target = "wa.lifecycle", mode = %self.mode, attempt = handle.attempt, error = %e, "previous session logout failed (normal on first run)");
			}
			handle.connection.close();
		}

		if let Some(previous) = previous {
			previous.connection.close();
		}
	}

	/// Cancels and closes attempt `id` if it is still the active one.
	fn abandon(&self, id: u64) {
		let mut active = self.active.lock();
		if active.as_ref().is_some_and(|a| a.id == id) {
			if let Some(attempt) = active.take() {
				attempt.cancel.cancel();
				attempt.connection.close();
			}
		}
	}

	/// Forgets attempt `id` once its driver has finished.
	fn release(&self, id: u64) {
		let mut active = self.active.lock();
		if active.as_ref().is_some_and(|a| a.id == id) {
			active.take();
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
	Continue,
	Finish,
}

/// Drives one [`Attempt`] until it finishes or is cancelled.
struct AttemptDriver {
	manager: LifecycleManager,
	id: u64,
	attempt: Attempt,
	connection: Arc<dyn Connection>,
	events: mpsc::UnboundedReceiver<EngineEvent>,
	/// Cleared once the event stream ends or the attempt detaches.
	events_open: bool,
	persist: PersistFn,
	cancel: CancellationToken,
	settle: Option<oneshot::Sender<Settlement>>,
	internal_tx: mpsc::UnboundedSender<Input>,
	internal_rx: mpsc::UnboundedReceiver<Input>,
	code_at: Option<Instant>,
	grace_at: Option<Instant>,
	deadline: Option<Instant>,
}

impl AttemptDriver {
	async fn run(mut self) {
		loop {
			let inputs = tokio::select! {
				biased;
				_ = self.cancel.cancelled() => {
					debug!(target = "wa.lifecycle", mode = %self.attempt.mode(), attempt = self.id, "attempt cancelled");
					return;
				}
				event = self.events.recv(), if self.events_open => match event {
					Some(EngineEvent::Connection(update)) => self.inputs_for(update),
					Some(EngineEvent::Credentials(update)) => {
						self.persist_credentials(update);
						continue;
					}
					None => {
						self.events_open = false;
						vec![Input::Close { status: None }]
					}
				},
				Some(input) = self.internal_rx.recv() => vec![input],
				() = sleep_until_opt(self.code_at) => {
					self.code_at = None;
					vec![Input::CodeDelayElapsed]
				}
				() = sleep_until_opt(self.grace_at) => {
					self.grace_at = None;
					vec![Input::GraceElapsed]
				}
				() = sleep_until_opt(self.deadline) => {
					self.deadline = None;
					vec![Input::DeadlineElapsed]
				}
			};

			for input in inputs {
				for effect in self.attempt.handle(input) {
					if self.apply(effect) == Flow::Finish {
						debug!(target = "wa.lifecycle", mode = %self.attempt.mode(), attempt = self.id, phase = ?self.attempt.phase(), "attempt finished");
						self.cancel.cancel();
						self.manager.inner.release(self.id);
						return;
					}
				}
			}
		}
	}

	fn inputs_for(&self, update: ConnectionUpdate) -> Vec<Input> {
		debug!(target = "wa.lifecycle", mode = %self.attempt.mode(), attempt = self.id, update = ?update, "connection update");
		let status = update.status_code();
		let mut inputs = Vec::new();
		if let Some(qr) = update.qr {
			inputs.push(Input::Qr(qr));
		}
		match update.connection {
			Some(ConnectionPhase::Connecting) => inputs.push(Input::Connecting),
			Some(ConnectionPhase::Open) => inputs.push(Input::Open {
				user: self.connection.user(),
			}),
			Some(ConnectionPhase::Close) => inputs.push(Input::Close { status }),
			None => {}
		}
		inputs
	}

	fn persist_credentials(&mut self, update: CredentialUpdate) {
		if let Err(e) = (self.persist)(update) {
			warn!(target = "wa.creds", mode = %self.attempt.mode(), attempt = self.id, error = %e, "failed to persist credential update");
		}
	}

	fn apply(&mut self, effect: Effect) -> Flow {
		let inner = &self.manager.inner;
		let mode = inner.mode;
		match effect {
			Effect::PresentQr(payload) => match inner.deps.renderer.render(&payload) {
				Ok(image_data) => inner.deps.bus.publish(LifecycleEvent::QrChallenge { image_data }),
				Err(e) => {
					warn!(target = "wa.lifecycle", mode = %mode, attempt = self.id, error = %e, "QR conversion failed");
					inner.deps.bus.publish(LifecycleEvent::Error {
						mode,
						message: "Failed to generate QR code".to_string(),
					});
				}
			},
			Effect::ScheduleCodeRequest => {
				self.code_at = Some(Instant::now() + inner.deps.timings.code_request_delay);
			}
			Effect::RequestCode(number) => {
				info!(target = "wa.lifecycle", mode = %mode, attempt = self.id, number = %number, "requesting pairing code");
				let connection = Arc::clone(&self.connection);
				let tx = self.internal_tx.clone();
				let token = self.cancel.child_token();
				tokio::spawn(async move {
					tokio::select! {
						_ = token.cancelled() => {}
						result = connection.request_pairing_code(&number) => {
							let input = match result {
								Ok(code) => Input::CodeIssued(code),
								Err(e) => Input::CodeFailed(rpc_message(&e)),
							};
							let _ = tx.send(input);
						}
					}
				});
			}
			Effect::ScheduleGrace => {
				self.grace_at = Some(Instant::now() + inner.deps.timings.pairing_grace);
			}
			Effect::Install(identity) => {
				info!(target = "wa.lifecycle", mode = %mode, attempt = self.id, identity = ?identity, "session authenticated");
				let replaced = inner.deps.registry.set(SessionHandle {
					mode,
					attempt: self.id,
					connection: Arc::clone(&self.connection),
					identity,
				});
				if let Some(replaced) = replaced {
					warn!(target = "wa.lifecycle", mode = %mode, attempt = self.id, replaced = replaced.attempt, "replaced a session still in the registry");
				}
			}
			Effect::Publish(event) => inner.deps.bus.publish(event),
			Effect::ClearSlot => {
				inner.deps.registry.clear_if(mode, self.id);
			}
			Effect::ScheduleRestart => {
				let epoch = inner.epoch.load(Ordering::SeqCst);
				info!(target = "wa.lifecycle", mode = %mode, attempt = self.id, delay = ?inner.deps.timings.reconnect_delay(mode), "reconnect scheduled");
				tokio::spawn(restart(self.manager.clone(), self.attempt.kind().clone(), epoch));
			}
			Effect::Detach => {
				debug!(target = "wa.lifecycle", mode = %mode, attempt = self.id, "connection closed with a code request pending");
				self.events_open = false;
				inner.release(self.id);
			}
			Effect::Settle(settlement) => {
				if let Some(tx) = self.settle.take() {
					let _ = tx.send(settlement);
				}
			}
			Effect::CloseConnection => {
				info!(target = "wa.lifecycle", mode = %mode, attempt = self.id, "closing connection");
				self.connection.close();
			}
			Effect::Finish => return Flow::Finish,
		}
		Flow::Continue
	}
}

/// Restarts `kind` after the mode's backoff unless a start or logout happened meanwhile.
///
/// Boxed so the start path and its restart do not form a recursive opaque type.
fn restart(manager: LifecycleManager, kind: AttemptKind, epoch: u64) -> Pin<Box<dyn Future<Output = ()> + Send>> {
	Box::pin(async move {
		let mode = manager.mode();
		sleep(manager.inner.deps.timings.reconnect_delay(mode)).await;
		if manager.inner.epoch.load(Ordering::SeqCst) != epoch {
			debug!(target = "wa.lifecycle", mode = %mode, "reconnect skipped, superseded");
			return;
		}
		info!(target = "wa.lifecycle", mode = %mode, "reconnecting");

		let result = match kind {
			AttemptKind::Qr => manager.start_qr().await,
			AttemptKind::Pairing { number } => manager.pair(number).await.map(|_| ()),
			AttemptKind::DirectPairing => return,
		};
		match result {
			Ok(()) | Err(Error::Superseded(_)) => {}
			Err(e) => {
				warn!(target = "wa.lifecycle", mode = %mode, error = %e, "reconnect failed");
				manager.inner.deps.bus.publish(LifecycleEvent::Error { mode, message: e.to_string() });
			}
		}
	})
}

async fn sleep_until_opt(at: Option<Instant>) {
	match at {
		Some(at) => sleep_until(at).await,
		None => std::future::pending().await,
	}
}

/// Engine error text without the method prefix.
fn rpc_message(error: &wa_runtime::Error) -> String {
	match error {
		wa_runtime::Error::Rpc { message, .. } => message.clone(),
		other => other.to_string(),
	}
}
