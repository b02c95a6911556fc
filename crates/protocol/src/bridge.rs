//! JSON messages exchanged with a protocol-engine sidecar over WebSocket.
//!
//! Requests carry a numeric `id`; the sidecar answers each with a `result`
//! message carrying the same id. Everything else it sends is an unsolicited
//! notification.
//!
//! ```json
//! {"id": 1, "type": "request_pairing_code", "number": "15551234567"}
//! {"type": "result", "id": 1, "value": "ABCD-1234"}
//! {"type": "connection_update", "update": {"connection": "open"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SocketConfig;
use crate::connection::ConnectionUpdate;
use crate::credentials::{CredentialState, CredentialUpdate};
use crate::mode::UserRecord;

/// A command sent to the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
	pub id: u32,
	#[serde(flatten)]
	pub command: BridgeCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeCommand {
	/// Start a connection with the given config and credential state.
	Open {
		config: SocketConfig,
		credentials: CredentialState,
	},
	RequestPairingCode {
		number: String,
	},
	SendText {
		jid: String,
		text: String,
	},
	Logout,
	Close,
}

impl BridgeCommand {
	/// Method name used in error reports.
	pub fn method(&self) -> &'static str {
		match self {
			BridgeCommand::Open { .. } => "open",
			BridgeCommand::RequestPairingCode { .. } => "request_pairing_code",
			BridgeCommand::SendText { .. } => "send_text",
			BridgeCommand::Logout => "logout",
			BridgeCommand::Close => "close",
		}
	}
}

/// A message received from the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
	/// Reply to the request with the same `id`.
	Result {
		id: u32,
		#[serde(default)]
		value: Value,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		error: Option<String>,
	},
	/// The account record of the live connection changed.
	Me {
		#[serde(default)]
		user: Option<UserRecord>,
	},
	ConnectionUpdate {
		update: ConnectionUpdate,
	},
	CredsUpdate {
		update: CredentialUpdate,
	},
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn request_flattens_command_beside_id() {
		let req = BridgeRequest {
			id: 7,
			command: BridgeCommand::SendText {
				jid: "1555@s.whatsapp.net".into(),
				text: "hi".into(),
			},
		};
		assert_eq!(
			serde_json::to_value(&req).unwrap(),
			json!({"id": 7, "type": "send_text", "jid": "1555@s.whatsapp.net", "text": "hi"})
		);
	}

	#[test]
	fn close_notification_parses() {
		let msg: BridgeMessage = serde_json::from_value(json!({
			"type": "connection_update",
			"update": {"connection": "close", "lastDisconnect": {"statusCode": 401}}
		}))
		.unwrap();
		let BridgeMessage::ConnectionUpdate { update } = msg else {
			panic!("expected connection update");
		};
		assert_eq!(update.status_code(), Some(401));
	}
}
