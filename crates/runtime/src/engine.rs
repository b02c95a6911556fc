//! The transport engine seam.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use wa_protocol::{ConnectionUpdate, CredentialState, CredentialUpdate, SocketConfig, UserRecord};

use crate::error::Result;

/// Boxed future returned by the object-safe engine traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Notification streamed from a live connection.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
	Connection(ConnectionUpdate),
	Credentials(CredentialUpdate),
}

/// Result of [`TransportEngine::open`].
pub struct OpenedConnection {
	pub connection: Arc<dyn Connection>,
	/// Ends when the engine drops the connection.
	pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

/// Opens connections to the messaging network.
pub trait TransportEngine: Send + Sync {
	fn open(&self, config: SocketConfig, credentials: CredentialState) -> BoxFuture<'_, Result<OpenedConnection>>;
}

/// One live connection instance.
pub trait Connection: Send + Sync {
	/// Account record advertised by the connection, once authenticated.
	fn user(&self) -> Option<UserRecord>;

	/// Asks the network for a pairing code for `number` (digits only).
	fn request_pairing_code<'a>(&'a self, number: &'a str) -> BoxFuture<'a, Result<String>>;

	fn send_text<'a>(&'a self, jid: &'a str, text: &'a str) -> BoxFuture<'a, Result<()>>;

	/// Graceful session termination; the network forgets this device.
	fn logout(&self) -> BoxFuture<'_, Result<()>>;

	/// Drops the connection without logging out.
	fn close(&self);
}
