//! Scriptable in-memory transport engine for tests.
//!
//! # Example
//!
//! ```ignore
//! let (engine, mut controller) = FakeEngineBuilder::new().with_pairing_code("ABCD-1234").build();
//! let gateway = Gateway::new(Arc::new(engine), store, root);
//!
//! gateway.start_qr().await?;
//! let conn = controller.next_connection().await.unwrap();
//! conn.qr("2@payload");
//! conn.open(UserRecord { id: "15551234567:1@s.whatsapp.net".into(), name: None });
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use wa_protocol::{ConnectionUpdate, CredentialState, CredentialUpdate, SocketConfig, UserRecord};

use crate::engine::{BoxFuture, Connection, EngineEvent, OpenedConnection, TransportEngine};
use crate::error::{Error, Result};

/// Builder for [`FakeEngine`].
pub struct FakeEngineBuilder {
	pairing: std::result::Result<String, String>,
	pairing_delay: Duration,
}

impl FakeEngineBuilder {
	pub fn new() -> Self {
		Self {
			pairing: Ok("FAKE-CODE".to_string()),
			pairing_delay: Duration::ZERO,
		}
	}

	/// Code returned by every pairing-code request.
	pub fn with_pairing_code(mut self, code: impl Into<String>) -> Self {
		self.pairing = Ok(code.into());
		self
	}

	/// Makes every pairing-code request fail with `message`.
	pub fn with_pairing_failure(mut self, message: impl Into<String>) -> Self {
		self.pairing = Err(message.into());
		self
	}

	/// Makes every pairing-code request take `delay` before answering.
	pub fn with_pairing_delay(mut self, delay: Duration) -> Self {
		self.pairing_delay = delay;
		self
	}

	/// Returns the engine and a controller for driving the connections it opens.
	pub fn build(self) -> (FakeEngine, FakeEngineController) {
		let (opened_tx, opened_rx) = mpsc::unbounded_channel();
		let shared = Arc::new(Shared {
			opened: AtomicUsize::new(0),
			fail_next_open: Mutex::new(None),
			pairing: Mutex::new(self.pairing),
			pairing_delay: self.pairing_delay,
			fail_next_logout: Mutex::new(None),
			configs: Mutex::new(Vec::new()),
			credentials: Mutex::new(Vec::new()),
		});
		let engine = FakeEngine {
			shared: Arc::clone(&shared),
			opened_tx,
		};
		let controller = FakeEngineController { shared, opened_rx };
		(engine, controller)
	}
}

impl Default for FakeEngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct Shared {
	opened: AtomicUsize,
	fail_next_open: Mutex<Option<String>>,
	pairing: Mutex<std::result::Result<String, String>>,
	pairing_delay: Duration,
	fail_next_logout: Mutex<Option<String>>,
	configs: Mutex<Vec<SocketConfig>>,
	credentials: Mutex<Vec<CredentialState>>,
}

/// Engine half: hand this to the code under test.
pub struct FakeEngine {
	shared: Arc<Shared>,
	opened_tx: mpsc::UnboundedSender<Arc<FakeConnection>>,
}

impl FakeEngine {
	/// Shorthand for `FakeEngineBuilder::new().build()`.
	pub fn new() -> (FakeEngine, FakeEngineController) {
		FakeEngineBuilder::new().build()
	}
}

impl TransportEngine for FakeEngine {
	fn open(&self, config: SocketConfig, credentials: CredentialState) -> BoxFuture<'_, Result<OpenedConnection>> {
		Box::pin(async move {
			if let Some(message) = self.shared.fail_next_open.lock().take() {
				return Err(Error::Open(message));
			}
			self.shared.configs.lock().push(config);
			self.shared.credentials.lock().push(credentials);

			let (events_tx, events) = mpsc::unbounded_channel();
			let (pairing_tx, pairing_rx) = mpsc::unbounded_channel();
			let conn = Arc::new(FakeConnection {
				index: self.shared.opened.fetch_add(1, Ordering::SeqCst),
				shared: Arc::clone(&self.shared),
				events_tx: Mutex::new(Some(events_tx)),
				user: Mutex::new(None),
				pairing_tx,
				pairing_rx: tokio::sync::Mutex::new(pairing_rx),
				pairing_requests: Mutex::new(Vec::new()),
				sent: Mutex::new(Vec::new()),
				logouts: AtomicUsize::new(0),
				closed: AtomicBool::new(false),
			});
			let _ = self.opened_tx.send(Arc::clone(&conn));
			Ok(OpenedConnection { connection: conn, events })
		})
	}
}

/// Controller half: observes opened connections and configures behavior.
pub struct FakeEngineController {
	shared: Arc<Shared>,
	opened_rx: mpsc::UnboundedReceiver<Arc<FakeConnection>>,
}

impl FakeEngineController {
	/// Waits for the next connection the engine opens.
	pub async fn next_connection(&mut self) -> Option<Arc<FakeConnection>> {
		self.opened_rx.recv().await
	}

	/// Returns an already-opened connection without waiting.
	pub fn try_next_connection(&mut self) -> Option<Arc<FakeConnection>> {
		self.opened_rx.try_recv().ok()
	}

	/// Number of successful `open` calls so far.
	pub fn opened_count(&self) -> usize {
		self.shared.opened.load(Ordering::SeqCst)
	}

	/// Makes the next `open` call fail.
	pub fn fail_next_open(&self, message: impl Into<String>) {
		*self.shared.fail_next_open.lock() = Some(message.into());
	}

	pub fn set_pairing_code(&self, code: impl Into<String>) {
		*self.shared.pairing.lock() = Ok(code.into());
	}

	pub fn set_pairing_failure(&self, message: impl Into<String>) {
		*self.shared.pairing.lock() = Err(message.into());
	}

	/// Makes the next `logout` call fail without closing the connection.
	pub fn fail_next_logout(&self, message: impl Into<String>) {
		*self.shared.fail_next_logout.lock() = Some(message.into());
	}

	/// Socket configs passed to `open`, oldest first.
	pub fn configs(&self) -> Vec<SocketConfig> {
		self.shared.configs.lock().clone()
	}

	/// Credential states passed to `open`, oldest first.
	pub fn credentials(&self) -> Vec<CredentialState> {
		self.shared.credentials.lock().clone()
	}
}

/// One connection opened by [`FakeEngine`].
pub struct FakeConnection {
	index: usize,
	shared: Arc<Shared>,
	events_tx: Mutex<Option<mpsc::UnboundedSender<EngineEvent>>>,
	user: Mutex<Option<UserRecord>>,
	pairing_tx: mpsc::UnboundedSender<String>,
	pairing_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
	pairing_requests: Mutex<Vec<String>>,
	sent: Mutex<Vec<(String, String)>>,
	logouts: AtomicUsize,
	closed: AtomicBool,
}

impl FakeConnection {
	/// Zero-based position in the engine's open order.
	pub fn index(&self) -> usize {
		self.index
	}

	pub fn connecting(&self) {
		self.emit(EngineEvent::Connection(ConnectionUpdate::connecting()));
	}

	pub fn qr(&self, payload: &str) {
		self.emit(EngineEvent::Connection(ConnectionUpdate::qr(payload)));
	}

	/// Authenticates as `user` and reports the open phase.
	pub fn open(&self, user: UserRecord) {
		*self.user.lock() = Some(user);
		self.emit(EngineEvent::Connection(ConnectionUpdate::open()));
	}

	/// Reports a close with `status` and ends the event stream.
	pub fn close_with(&self, status: Option<u16>) {
		self.emit(EngineEvent::Connection(ConnectionUpdate::close(status)));
		self.shut_down();
	}

	pub fn creds(&self, update: CredentialUpdate) {
		self.emit(EngineEvent::Credentials(update));
	}

	/// Waits for the next pairing-code request and returns its number.
	pub async fn next_pairing_request(&self) -> Option<String> {
		self.pairing_rx.lock().await.recv().await
	}

	pub fn pairing_requests(&self) -> Vec<String> {
		self.pairing_requests.lock().clone()
	}

	/// `(jid, text)` pairs passed to `send_text`.
	pub fn sent(&self) -> Vec<(String, String)> {
		self.sent.lock().clone()
	}

	pub fn logouts(&self) -> usize {
		self.logouts.load(Ordering::SeqCst)
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	fn emit(&self, event: EngineEvent) {
		if let Some(tx) = self.events_tx.lock().as_ref() {
			let _ = tx.send(event);
		}
	}

	fn shut_down(&self) {
		self.closed.store(true, Ordering::SeqCst);
		self.events_tx.lock().take();
	}

	fn ensure_open(&self) -> Result<()> {
		if self.is_closed() { Err(Error::ConnectionClosed) } else { Ok(()) }
	}
}

impl Connection for FakeConnection {
	fn user(&self) -> Option<UserRecord> {
		self.user.lock().clone()
	}

	fn request_pairing_code<'a>(&'a self, number: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			self.ensure_open()?;
			self.pairing_requests.lock().push(number.to_string());
			let _ = self.pairing_tx.send(number.to_string());
			if !self.shared.pairing_delay.is_zero() {
				tokio::time::sleep(self.shared.pairing_delay).await;
			}
			self.shared.pairing.lock().clone().map_err(|message| Error::Rpc {
				method: "request_pairing_code",
				message,
			})
		})
	}

	fn send_text<'a>(&'a self, jid: &'a str, text: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.ensure_open()?;
			self.sent.lock().push((jid.to_string(), text.to_string()));
			Ok(())
		})
	}

	fn logout(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.ensure_open()?;
			if let Some(message) = self.shared.fail_next_logout.lock().take() {
				return Err(Error::Rpc { method: "logout", message });
			}
			self.logouts.fetch_add(1, Ordering::SeqCst);
			self.close_with(Some(wa_protocol::DisconnectReason::LoggedOut.code()));
			Ok(())
		})
	}

	fn close(&self) {
		self.shut_down();
	}
}
