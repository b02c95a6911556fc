//! Server configuration: JSON file, then `PORT`, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use wa::Timings;

use crate::cli::ServeArgs;
use crate::error::{CliError, Result};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "wa.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
	pub host: String,
	pub port: u16,
	pub session_root: PathBuf,
	pub bridge_url: String,
	pub timings: TimingOverrides,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			host: "0.0.0.0".to_string(),
			port: 3000,
			session_root: PathBuf::from("."),
			bridge_url: "ws://127.0.0.1:8790".to_string(),
			timings: TimingOverrides::default(),
		}
	}
}

/// Millisecond overrides for [`Timings`]; absent keys keep the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingOverrides {
	pub qr_reconnect_ms: Option<u64>,
	pub pairing_reconnect_ms: Option<u64>,
	pub code_request_delay_ms: Option<u64>,
	pub pairing_grace_ms: Option<u64>,
	pub pairing_deadline_ms: Option<u64>,
	pub qr_connect_timeout_ms: Option<u64>,
	pub qr_expiry_ms: Option<u64>,
	pub pairing_connect_timeout_ms: Option<u64>,
	pub direct_connect_timeout_ms: Option<u64>,
}

impl TimingOverrides {
	pub fn apply(&self, mut timings: Timings) -> Timings {
		let set = |slot: &mut Duration, ms: Option<u64>| {
			if let Some(ms) = ms {
				*slot = Duration::from_millis(ms);
			}
		};
		set(&mut timings.qr_reconnect, self.qr_reconnect_ms);
		set(&mut timings.pairing_reconnect, self.pairing_reconnect_ms);
		set(&mut timings.code_request_delay, self.code_request_delay_ms);
		set(&mut timings.pairing_grace, self.pairing_grace_ms);
		set(&mut timings.pairing_deadline, self.pairing_deadline_ms);
		set(&mut timings.qr_connect_timeout, self.qr_connect_timeout_ms);
		set(&mut timings.qr_expiry, self.qr_expiry_ms);
		set(&mut timings.pairing_connect_timeout, self.pairing_connect_timeout_ms);
		set(&mut timings.direct_connect_timeout, self.direct_connect_timeout_ms);
		timings
	}
}

impl ServerConfig {
	/// Reads `explicit`, else `./wa.json` when it exists, else the defaults.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		match explicit {
			Some(path) => Self::from_file(path),
			None => {
				let fallback = Path::new(DEFAULT_CONFIG_FILE);
				if fallback.is_file() { Self::from_file(fallback) } else { Ok(Self::default()) }
			}
		}
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
			path: path.to_path_buf(),
			source,
		})?;
		serde_json::from_str(&raw).map_err(|source| CliError::ConfigParse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Applies the `PORT` environment value. Unset or empty leaves the port alone.
	pub fn apply_port_override(&mut self, port: Option<&str>) -> Result<()> {
		let Some(raw) = port.map(str::trim).filter(|raw| !raw.is_empty()) else {
			return Ok(());
		};
		self.port = raw.parse().map_err(|_| CliError::InvalidPort(raw.to_string()))?;
		Ok(())
	}

	pub fn apply_args(&mut self, args: &ServeArgs) {
		if let Some(host) = &args.host {
			self.host = host.clone();
		}
		if let Some(port) = args.port {
			self.port = port;
		}
		if let Some(root) = &args.session_root {
			self.session_root = root.clone();
		}
		if let Some(url) = &args.bridge_url {
			self.bridge_url = url.clone();
		}
	}

	pub fn timings(&self) -> Timings {
		self.timings.apply(Timings::default())
	}

	pub fn bind_addr(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}
