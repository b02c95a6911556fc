//! Login modes and the identity derived from an authenticated session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which independent login flow a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginMode {
	/// Scan-based login: the network hands out QR payloads until one is scanned.
	Qr,
	/// Phone-number login: a pairing code is requested and typed in on the phone.
	Pairing,
}

impl LoginMode {
	/// Both modes, in slot order.
	pub const ALL: [LoginMode; 2] = [LoginMode::Qr, LoginMode::Pairing];

	/// Lowercase name used in routes, events and config.
	pub fn as_str(self) -> &'static str {
		match self {
			LoginMode::Qr => "qr",
			LoginMode::Pairing => "pairing",
		}
	}

	/// Directory name holding this mode's credentials under the session root.
	pub fn session_dir_name(self) -> &'static str {
		match self {
			LoginMode::Qr => "session_qr",
			LoginMode::Pairing => "session_pairing",
		}
	}
}

impl fmt::Display for LoginMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for LoginMode {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"qr" => Ok(LoginMode::Qr),
			"pairing" => Ok(LoginMode::Pairing),
			_ => Err(format!("unknown login mode: {s}")),
		}
	}
}

/// The account record a live connection advertises once it is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
	/// Network address of the account, e.g. `15551234567:12@s.whatsapp.net`.
	pub id: String,
	/// Push name, when the account has one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
}

/// Display identity of an authenticated session. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
	pub display_name: String,
	pub numeric_id: String,
}
