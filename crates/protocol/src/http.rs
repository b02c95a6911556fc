//! Request and response bodies of the HTTP surface.

use serde::{Deserialize, Serialize};

/// Plain acknowledgment: `{"status": true, "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
	pub status: bool,
	pub message: String,
}

impl Ack {
	pub fn ok(message: impl Into<String>) -> Self {
		Self {
			status: true,
			message: message.into(),
		}
	}
}

/// Failure body: `{"status": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
	pub status: bool,
	pub error: String,
}

impl Failure {
	pub fn new(error: impl Into<String>) -> Self {
		Self {
			status: false,
			error: error.into(),
		}
	}
}

/// Registry presence of one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
	Connected,
	Disconnected,
}

impl SlotStatus {
	pub fn from_present(present: bool) -> Self {
		if present { SlotStatus::Connected } else { SlotStatus::Disconnected }
	}
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
	pub qr: SlotStatus,
	pub pairing: SlotStatus,
}

/// Body of `POST /send-message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
	pub number: String,
	pub message: String,
	/// Login mode name; `qr` when omitted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mode: Option<String>,
}

/// Body of `POST /pairing-code` and `POST /pairing-direct`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRequest {
	#[serde(default)]
	pub number: Option<String>,
}

/// Successful body of `POST /pairing-direct`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingCodeReply {
	pub status: bool,
	pub message: String,
	pub code: String,
}

impl PairingCodeReply {
	pub fn issued(code: impl Into<String>) -> Self {
		Self {
			status: true,
			message: "Pairing code generated".to_string(),
			code: code.into(),
		}
	}
}
