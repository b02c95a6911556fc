//! Error type for engine, bridge and credential-store failures.

use thiserror::Error;

/// Errors raised by the transport seam and the credential store.
#[derive(Debug, Error)]
pub enum Error {
	/// The engine could not establish a connection.
	#[error("failed to open connection: {0}")]
	Open(String),

	/// The connection (or the channel backing it) is gone.
	#[error("connection closed")]
	ConnectionClosed,

	/// The engine answered a request with an error.
	#[error("{method} failed: {message}")]
	Rpc { method: &'static str, message: String },

	/// The peer sent something that does not fit the bridge protocol.
	#[error("protocol error: {0}")]
	Protocol(String),

	#[error("websocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
