//! Lifecycle events fanned out to observers.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::mode::{LoginMode, SessionIdentity};

/// A discrete, externally observable transition of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
	/// A fresh QR payload, already rendered for display.
	QrChallenge { image_data: String },
	/// A pairing code to be typed in on the phone.
	PairingCode { code: String },
	Authenticated { mode: LoginMode, identity: SessionIdentity },
	Disconnected { mode: LoginMode, reason: String },
	Error { mode: LoginMode, message: String },
}

impl LifecycleEvent {
	/// Observer-facing event name.
	pub fn name(&self) -> &'static str {
		match self {
			LifecycleEvent::QrChallenge { .. } => "qr",
			LifecycleEvent::PairingCode { .. } => "pairing-code",
			LifecycleEvent::Authenticated { .. } => "authenticated",
			LifecycleEvent::Disconnected { .. } => "disconnected",
			LifecycleEvent::Error { .. } => "error",
		}
	}

	/// Observer-facing payload.
	///
	/// `authenticated` carries `{name, number, mode}`; every other event carries a bare string.
	pub fn payload(&self) -> Value {
		match self {
			LifecycleEvent::QrChallenge { image_data } => Value::String(image_data.clone()),
			LifecycleEvent::PairingCode { code } => Value::String(code.clone()),
			LifecycleEvent::Authenticated { mode, identity } => json!({
				"name": identity.display_name,
				"number": identity.numeric_id,
				"mode": mode,
			}),
			LifecycleEvent::Disconnected { reason, .. } => Value::String(reason.clone()),
			LifecycleEvent::Error { message, .. } => Value::String(message.clone()),
		}
	}
}

/// One event as written to an observer transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverFrame {
	pub event: String,
	pub data: Value,
}

impl From<&LifecycleEvent> for ObserverFrame {
	fn from(event: &LifecycleEvent) -> Self {
		Self {
			event: event.name().to_string(),
			data: event.payload(),
		}
	}
}
