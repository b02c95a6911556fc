//! Connection-state notifications emitted by the transport engine.
//!
//! Shape follows the engine's `connection.update` payload:
//! ```json
//! {
//!   "connection": "close",
//!   "lastDisconnect": { "statusCode": 401, "message": "Connection Failure" }
//! }
//! ```
//! Any field may be absent; a single update can carry a QR payload and a phase.

use serde::{Deserialize, Serialize};

/// Coarse phase reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
	Connecting,
	Open,
	Close,
}

/// Why the previous connection went away.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDisconnect {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status_code: Option<u16>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
}

/// One connection-update notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub connection: Option<ConnectionPhase>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub qr: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_disconnect: Option<LastDisconnect>,
}

impl ConnectionUpdate {
	pub fn connecting() -> Self {
		Self {
			connection: Some(ConnectionPhase::Connecting),
			..Default::default()
		}
	}

	pub fn open() -> Self {
		Self {
			connection: Some(ConnectionPhase::Open),
			..Default::default()
		}
	}

	pub fn qr(payload: impl Into<String>) -> Self {
		Self {
			qr: Some(payload.into()),
			..Default::default()
		}
	}

	pub fn close(status_code: Option<u16>) -> Self {
		Self {
			connection: Some(ConnectionPhase::Close),
			qr: None,
			last_disconnect: Some(LastDisconnect { status_code, message: None }),
		}
	}

	/// Status code attached to a close, if the engine supplied one.
	pub fn status_code(&self) -> Option<u16> {
		self.last_disconnect.as_ref().and_then(|d| d.status_code)
	}
}

/// Known disconnect status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
	ConnectionLost,
	ConnectionClosed,
	ConnectionReplaced,
	LoggedOut,
	BadSession,
	RestartRequired,
	MultideviceMismatch,
	Forbidden,
	UnavailableService,
}

impl DisconnectReason {
	pub const fn code(self) -> u16 {
		match self {
			DisconnectReason::ConnectionLost => 408,
			DisconnectReason::ConnectionClosed => 428,
			DisconnectReason::ConnectionReplaced => 440,
			DisconnectReason::LoggedOut => 401,
			DisconnectReason::BadSession => 500,
			DisconnectReason::RestartRequired => 515,
			DisconnectReason::MultideviceMismatch => 411,
			DisconnectReason::Forbidden => 403,
			DisconnectReason::UnavailableService => 503,
		}
	}

	pub fn from_code(code: u16) -> Option<Self> {
		match code {
			408 => Some(DisconnectReason::ConnectionLost),
			428 => Some(DisconnectReason::ConnectionClosed),
			440 => Some(DisconnectReason::ConnectionReplaced),
			401 => Some(DisconnectReason::LoggedOut),
			500 => Some(DisconnectReason::BadSession),
			515 => Some(DisconnectReason::RestartRequired),
			411 => Some(DisconnectReason::MultideviceMismatch),
			403 => Some(DisconnectReason::Forbidden),
			503 => Some(DisconnectReason::UnavailableService),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn close_update_deserializes_from_engine_shape() {
		let json = r#"{"connection":"close","lastDisconnect":{"statusCode":401,"message":"Connection Failure"}}"#;
		let update: ConnectionUpdate = serde_json::from_str(json).unwrap();
		assert_eq!(update.connection, Some(ConnectionPhase::Close));
		assert_eq!(update.status_code(), Some(401));
		assert!(update.qr.is_none());
	}

	#[test]
	fn empty_update_has_no_status() {
		let update: ConnectionUpdate = serde_json::from_str("{}").unwrap();
		assert_eq!(update, ConnectionUpdate::default());
		assert_eq!(update.status_code(), None);
	}

	#[test]
	fn disconnect_reason_codes_round_trip() {
		for reason in [
			DisconnectReason::ConnectionLost,
			DisconnectReason::LoggedOut,
			DisconnectReason::RestartRequired,
			DisconnectReason::UnavailableService,
		] {
			assert_eq!(DisconnectReason::from_code(reason.code()), Some(reason));
		}
		assert_eq!(DisconnectReason::from_code(200), None);
	}
}
