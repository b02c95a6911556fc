//! Reconnection and timeout policy.

use std::time::Duration;

use wa_protocol::{DisconnectReason, LoginMode, SocketConfig};

use super::machine::AttemptKind;

/// How a close notification is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
	/// Reconnect after the mode's backoff delay.
	Recoverable,
	/// The account logged this device out; stay down.
	Terminal,
}

/// Terminal iff `status` is the logged-out code; anything else, including no status, is recoverable.
pub fn classify_close(status: Option<u16>) -> CloseKind {
	if status == Some(DisconnectReason::LoggedOut.code()) {
		CloseKind::Terminal
	} else {
		CloseKind::Recoverable
	}
}

/// Every delay and timeout the lifecycle uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
	pub qr_reconnect: Duration,
	pub pairing_reconnect: Duration,
	/// Wait after the first `connecting` before asking for a pairing code.
	pub code_request_delay: Duration,
	/// How long a delivered code keeps the caller waiting for authentication.
	pub pairing_grace: Duration,
	/// Hard deadline of a pairing attempt, measured from the start call.
	pub pairing_deadline: Duration,
	pub qr_connect_timeout: Duration,
	pub qr_expiry: Duration,
	pub pairing_connect_timeout: Duration,
	pub direct_connect_timeout: Duration,
}

impl Default for Timings {
	fn default() -> Self {
		Self {
			qr_reconnect: Duration::from_secs(2),
			pairing_reconnect: Duration::from_secs(5),
			code_request_delay: Duration::from_secs(5),
			pairing_grace: Duration::from_secs(60),
			pairing_deadline: Duration::from_secs(120),
			qr_connect_timeout: Duration::from_secs(60),
			qr_expiry: Duration::from_secs(40),
			pairing_connect_timeout: Duration::from_secs(120),
			direct_connect_timeout: Duration::from_secs(60),
		}
	}
}

impl Timings {
	pub fn reconnect_delay(&self, mode: LoginMode) -> Duration {
		match mode {
			LoginMode::Qr => self.qr_reconnect,
			LoginMode::Pairing => self.pairing_reconnect,
		}
	}
}

/// Transport configuration for one attempt.
pub fn socket_config(kind: &AttemptKind, timings: &Timings) -> SocketConfig {
	match kind {
		AttemptKind::Qr => SocketConfig {
			print_qr_in_terminal: true,
			browser: SocketConfig::browser("Chrome", "Desktop", "120"),
			connect_timeout_ms: millis(timings.qr_connect_timeout),
			qr_timeout_ms: Some(millis(timings.qr_expiry)),
			mobile: None,
		},
		AttemptKind::Pairing { .. } => SocketConfig {
			print_qr_in_terminal: false,
			browser: SocketConfig::browser("WhatsApp", "Desktop", "3.0"),
			connect_timeout_ms: millis(timings.pairing_connect_timeout),
			qr_timeout_ms: None,
			mobile: None,
		},
		AttemptKind::DirectPairing => SocketConfig {
			print_qr_in_terminal: false,
			browser: SocketConfig::browser("Chrome", "Desktop", "120"),
			connect_timeout_ms: millis(timings.direct_connect_timeout),
			qr_timeout_ms: None,
			mobile: Some(false),
		},
	}
}

fn millis(d: Duration) -> u64 {
	u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn only_logged_out_is_terminal() {
		assert_eq!(classify_close(Some(401)), CloseKind::Terminal);
		for status in [None, Some(408), Some(411), Some(428), Some(440), Some(500), Some(503), Some(515), Some(0)] {
			assert_eq!(classify_close(status), CloseKind::Recoverable, "{status:?}");
		}
	}

	#[test]
	fn qr_config_enables_terminal_qr_and_expiry() {
		let config = socket_config(&AttemptKind::Qr, &Timings::default());
		assert!(config.print_qr_in_terminal);
		assert_eq!(config.connect_timeout_ms, 60_000);
		assert_eq!(config.qr_timeout_ms, Some(40_000));
		assert_eq!(config.browser[0], "Chrome");
	}

	#[test]
	fn pairing_configs_differ_in_browser_and_mobile() {
		let timings = Timings::default();
		let pairing = socket_config(&AttemptKind::Pairing { number: "1".into() }, &timings);
		assert_eq!(pairing.browser, SocketConfig::browser("WhatsApp", "Desktop", "3.0"));
		assert_eq!(pairing.connect_timeout_ms, 120_000);

		let direct = socket_config(&AttemptKind::DirectPairing, &timings);
		assert_eq!(direct.mobile, Some(false));
		assert_eq!(direct.connect_timeout_ms, 60_000);
	}

	#[test]
	fn reconnect_delay_per_mode() {
		let timings = Timings::default();
		assert_eq!(timings.reconnect_delay(LoginMode::Qr), Duration::from_secs(2));
		assert_eq!(timings.reconnect_delay(LoginMode::Pairing), Duration::from_secs(5));
	}
}
