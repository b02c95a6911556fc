//! Per-connection transport configuration.

use serde::{Deserialize, Serialize};

/// Options passed to the engine when opening a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketConfig {
	/// Ask the engine to print QR payloads to its terminal as a debug aid.
	pub print_qr_in_terminal: bool,
	/// Client descriptor advertised to the network: `[client, platform, version]`.
	pub browser: [String; 3],
	pub connect_timeout_ms: u64,
	/// How long each QR payload stays valid; engine default when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub qr_timeout_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mobile: Option<bool>,
}

impl SocketConfig {
	pub fn browser(client: &str, platform: &str, version: &str) -> [String; 3] {
		[client.to_string(), platform.to_string(), version.to_string()]
	}
}
