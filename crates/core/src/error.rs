//! Error types for session lifecycle operations.

use std::time::Duration;

use thiserror::Error;
use wa_protocol::LoginMode;

/// Errors surfaced by lifecycle, registry and gateway operations.
#[derive(Debug, Error)]
pub enum Error {
	/// The transport engine refused to open a connection.
	#[error("failed to start {mode} client: {source}")]
	Start {
		mode: LoginMode,
		#[source]
		source: wa_runtime::Error,
	},

	/// The pairing attempt hit its hard deadline before settling.
	#[error("Operation timeout after {} seconds", .after.as_secs())]
	Timeout { after: Duration },

	/// The connection closed before a pairing code was obtained.
	#[error("Connection closed with code {}", status_label(.status))]
	Closed { status: Option<u16> },

	/// No session is installed for the mode.
	#[error("client {0} is not logged in")]
	NotActive(LoginMode),

	/// Unknown mode name, or a mode with nothing to act on.
	#[error("Invalid mode or client not initialized: {0}")]
	BadMode(String),

	#[error("Invalid phone number format")]
	InvalidPhoneNumber,

	#[error("invalid recipient number: {0:?}")]
	InvalidRecipient(String),

	#[error("Failed to get pairing code: {0}")]
	PairingCode(String),

	/// A newer start (or a logout) replaced the attempt this caller was waiting on.
	#[error("{0} attempt was superseded")]
	Superseded(LoginMode),

	/// A send or logout call on a live connection failed.
	#[error(transparent)]
	Transport(wa_runtime::Error),

	#[error("credential store error: {0}")]
	Credentials(#[source] wa_runtime::Error),
}

impl Error {
	/// Whether the failure is the caller's fault rather than the system's.
	pub fn is_caller_error(&self) -> bool {
		matches!(
			self,
			Error::NotActive(_) | Error::BadMode(_) | Error::InvalidPhoneNumber | Error::InvalidRecipient(_)
		)
	}
}

fn status_label(status: &Option<u16>) -> String {
	match status {
		Some(code) => code.to_string(),
		None => "unknown".to_string(),
	}
}

pub type Result<T> = std::result::Result<T, Error>;
