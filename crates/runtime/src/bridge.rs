//! [`TransportEngine`] backed by a protocol sidecar reached over WebSocket.
//!
//! Each `open` dials a fresh socket, so one socket carries exactly one
//! connection. Requests are correlated with replies by sequential id using
//! oneshot channels; unsolicited messages become [`EngineEvent`]s.
//!
//! # Architecture
//!
//! - a writer task drains an unbounded queue into the socket sink
//! - a reader task parses [`BridgeMessage`]s and dispatches them
//! - when the socket ends, pending calls fail with
//!   [`Error::ConnectionClosed`] and the event stream ends

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};
use wa_protocol::{BridgeCommand, BridgeMessage, BridgeRequest, CredentialState, SocketConfig, UserRecord};

use crate::engine::{BoxFuture, Connection, EngineEvent, OpenedConnection, TransportEngine};
use crate::error::{Error, Result};

type Reply = std::result::Result<Value, String>;

/// In-flight calls; `closed` is set once the socket stream ends.
#[derive(Default)]
struct PendingCalls {
	closed: bool,
	calls: HashMap<u32, oneshot::Sender<Reply>>,
}

type Pending = Arc<Mutex<PendingCalls>>;

/// Removes a call's entry when its future is dropped before the reply arrives.
struct CallGuard<'a> {
	pending: &'a Pending,
	id: u32,
}

impl Drop for CallGuard<'_> {
	fn drop(&mut self) {
		self.pending.lock().calls.remove(&self.id);
	}
}

/// Engine that forwards every connection to a sidecar at `url`.
#[derive(Debug, Clone)]
pub struct BridgeEngine {
	url: String,
}

impl BridgeEngine {
	pub fn new(url: impl Into<String>) -> Self {
		Self { url: url.into() }
	}

	pub fn url(&self) -> &str {
		&self.url
	}
}

impl TransportEngine for BridgeEngine {
	fn open(&self, config: SocketConfig, credentials: CredentialState) -> BoxFuture<'_, Result<OpenedConnection>> {
		Box::pin(async move {
			let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
			let (mut sink, mut stream) = ws.split();
			debug!(target = "wa.bridge", url = %self.url, "sidecar connected");

			let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
			tokio::spawn(async move {
				while let Some(message) = outgoing_rx.recv().await {
					if let Err(e) = sink.send(message).await {
						warn!(target = "wa.bridge", error = %e, "sidecar write failed");
						break;
					}
				}
				let _ = sink.close().await;
			});

			let conn = Arc::new(BridgeConnection {
				last_id: AtomicU32::new(0),
				pending: Arc::new(Mutex::new(PendingCalls::default())),
				outgoing: Mutex::new(Some(outgoing_tx)),
				user: Arc::new(Mutex::new(None)),
			});

			let (events_tx, events) = mpsc::unbounded_channel();
			let pending = Arc::clone(&conn.pending);
			let user = Arc::clone(&conn.user);
			tokio::spawn(async move {
				while let Some(frame) = stream.next().await {
					let text = match frame {
						Ok(Message::Text(text)) => text,
						Ok(Message::Close(_)) => break,
						Ok(Message::Binary(_)) => {
							warn!(target = "wa.bridge", "ignoring binary frame from sidecar");
							continue;
						}
						Ok(_) => continue,
						Err(e) => {
							warn!(target = "wa.bridge", error = %e, "sidecar read failed");
							break;
						}
					};
					match serde_json::from_str::<BridgeMessage>(&text) {
						Ok(message) => dispatch(message, &pending, &user, &events_tx),
						Err(e) => error!(target = "wa.bridge", error = %e, message = %text, "failed to parse sidecar message"),
					}
				}
				debug!(target = "wa.bridge", "sidecar stream ended");
				// Dropping the senders fails every waiting call.
				let mut pending = pending.lock();
				pending.closed = true;
				pending.calls.clear();
			});

			if let Err(e) = conn.call(BridgeCommand::Open { config, credentials }).await {
				conn.shut_down();
				return Err(match e {
					Error::Rpc { message, .. } => Error::Open(message),
					other => other,
				});
			}

			Ok(OpenedConnection { connection: conn, events })
		})
	}
}

fn dispatch(message: BridgeMessage, pending: &Pending, user: &Mutex<Option<UserRecord>>, events: &mpsc::UnboundedSender<EngineEvent>) {
	match message {
		BridgeMessage::Result { id, value, error } => {
			let Some(callback) = pending.lock().calls.remove(&id) else {
				warn!(target = "wa.bridge", id, "reply for unknown request");
				return;
			};
			let _ = callback.send(match error {
				Some(message) => Err(message),
				None => Ok(value),
			});
		}
		BridgeMessage::Me { user: record } => *user.lock() = record,
		BridgeMessage::ConnectionUpdate { update } => {
			let _ = events.send(EngineEvent::Connection(update));
		}
		BridgeMessage::CredsUpdate { update } => {
			let _ = events.send(EngineEvent::Credentials(update));
		}
	}
}

struct BridgeConnection {
	last_id: AtomicU32,
	pending: Pending,
	outgoing: Mutex<Option<mpsc::UnboundedSender<Message>>>,
	user: Arc<Mutex<Option<UserRecord>>>,
}

impl BridgeConnection {
	async fn call(&self, command: BridgeCommand) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let method = command.method();
		let (tx, rx) = oneshot::channel();
		{
			let mut pending = self.pending.lock();
			if pending.closed {
				return Err(Error::ConnectionClosed);
			}
			pending.calls.insert(id, tx);
		}
		let _guard = CallGuard { pending: &self.pending, id };

		let text = serde_json::to_string(&BridgeRequest { id, command })?;
		self.send_frame(Message::Text(text))?;

		rx.await
			.map_err(|_| Error::ConnectionClosed)?
			.map_err(|message| Error::Rpc { method, message })
	}

	fn send_frame(&self, message: Message) -> Result<()> {
		let outgoing = self.outgoing.lock();
		let tx = outgoing.as_ref().ok_or(Error::ConnectionClosed)?;
		tx.send(message).map_err(|_| Error::ConnectionClosed)
	}

	fn shut_down(&self) {
		let _ = self.send_frame(Message::Close(None));
		self.outgoing.lock().take();
	}
}

impl Connection for BridgeConnection {
	fn user(&self) -> Option<UserRecord> {
		self.user.lock().clone()
	}

	fn request_pairing_code<'a>(&'a self, number: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let value = self
				.call(BridgeCommand::RequestPairingCode {
					number: number.to_string(),
				})
				.await?;
			match value {
				Value::String(code) => Ok(code),
				other => Err(Error::Protocol(format!("pairing code is not a string: {other}"))),
			}
		})
	}

	fn send_text<'a>(&'a self, jid: &'a str, text: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.call(BridgeCommand::SendText {
				jid: jid.to_string(),
				text: text.to_string(),
			})
			.await
			.map(|_| ())
		})
	}

	fn logout(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { self.call(BridgeCommand::Logout).await.map(|_| ()) })
	}

	fn close(&self) {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		if let Ok(text) = serde_json::to_string(&BridgeRequest {
			id,
			command: BridgeCommand::Close,
		}) {
			let _ = self.send_frame(Message::Text(text));
		}
		self.shut_down();
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	fn connection() -> (BridgeConnection, mpsc::UnboundedReceiver<Message>) {
		let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
		let conn = BridgeConnection {
			last_id: AtomicU32::new(0),
			pending: Arc::new(Mutex::new(PendingCalls::default())),
			outgoing: Mutex::new(Some(outgoing_tx)),
			user: Arc::new(Mutex::new(None)),
		};
		(conn, outgoing_rx)
	}

	#[tokio::test]
	async fn dropped_call_forgets_its_pending_entry() {
		let (conn, mut outgoing) = connection();

		let result = tokio::time::timeout(Duration::from_millis(20), conn.call(BridgeCommand::Logout)).await;

		assert!(result.is_err());
		assert!(outgoing.recv().await.is_some());
		assert!(conn.pending.lock().calls.is_empty());
	}

	#[tokio::test]
	async fn failed_send_forgets_its_pending_entry() {
		let (conn, outgoing) = connection();
		drop(outgoing);

		assert!(matches!(conn.call(BridgeCommand::Logout).await, Err(Error::ConnectionClosed)));
		assert!(conn.pending.lock().calls.is_empty());
	}

	#[tokio::test]
	async fn answered_call_resolves_and_clears_entry() {
		let (conn, _outgoing) = connection();
		let pending = Arc::clone(&conn.pending);
		let user = Mutex::new(None);
		let (events_tx, _events) = mpsc::unbounded_channel();

		let call = conn.call(BridgeCommand::Logout);
		let reply = async {
			tokio::task::yield_now().await;
			dispatch(
				BridgeMessage::Result {
					id: 0,
					value: Value::Null,
					error: None,
				},
				&pending,
				&user,
				&events_tx,
			);
		};
		let (result, ()) = tokio::join!(call, reply);

		assert_eq!(result.unwrap(), Value::Null);
		assert!(conn.pending.lock().calls.is_empty());
	}
}
