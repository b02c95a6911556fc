//! Pure per-attempt state machine.
//!
//! [`Attempt::handle`] maps one [`Input`] to the [`Effect`]s the driver must
//! carry out. It performs no I/O and owns no timers, so every transition can
//! be exercised by feeding synthetic inputs.
//!
//! ```text
//! Idle -> Connecting -> (Challenging)? -> Open -> Closing(Recoverable | Terminal)
//! ```

use wa_protocol::{LifecycleEvent, LoginMode, SessionIdentity, UserRecord};

use super::policy::{CloseKind, classify_close};
use crate::session::{anonymous_identity, identity_from_user};

/// What an attempt is trying to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptKind {
	Qr,
	/// Pairing-code login; the code is requested once the transport is connecting.
	Pairing { number: String },
	/// Pairing-code login where the caller requests the code itself right
	/// after open; never reconnects.
	DirectPairing,
}

impl AttemptKind {
	pub fn mode(&self) -> LoginMode {
		match self {
			AttemptKind::Qr => LoginMode::Qr,
			AttemptKind::Pairing { .. } | AttemptKind::DirectPairing => LoginMode::Pairing,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Connecting,
	/// A QR payload is displayed or a pairing code is in play.
	Challenging,
	Open,
	Closing(CloseKind),
}

/// Something that happened to the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
	Qr(String),
	Connecting,
	Open { user: Option<UserRecord> },
	Close { status: Option<u16> },
	CodeDelayElapsed,
	CodeIssued(String),
	CodeFailed(String),
	GraceElapsed,
	DeadlineElapsed,
}

impl Input {
	/// Inputs that come from the connection itself rather than from the code request or a timer.
	fn is_connection_input(&self) -> bool {
		matches!(
			self,
			Input::Qr(_) | Input::Connecting | Input::Open { .. } | Input::Close { .. } | Input::CodeDelayElapsed
		)
	}
}

/// How a waiting pairing caller is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
	Authenticated,
	/// The code was delivered and the grace period ran out without authentication.
	CodeIssued(String),
	Closed(Option<u16>),
	CodeFailed(String),
	TimedOut,
}

/// Work the driver performs on behalf of the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
	/// Render the payload and publish it.
	PresentQr(String),
	/// Arm the code-request delay timer.
	ScheduleCodeRequest,
	/// Ask the connection for a pairing code for this number.
	RequestCode(String),
	/// Arm the grace timer.
	ScheduleGrace,
	/// Install this attempt's handle in the registry.
	Install(Option<SessionIdentity>),
	Publish(LifecycleEvent),
	/// Clear the registry slot if it still holds this attempt's handle.
	ClearSlot,
	/// Start a fresh attempt of the same kind after the mode's backoff.
	ScheduleRestart,
	/// Stop being the mode's active attempt while a code request keeps the caller waiting.
	Detach,
	Settle(Settlement),
	CloseConnection,
	/// Stop driving this attempt.
	Finish,
}

/// Reason published when a mode's session is logged out.
pub fn logged_out_reason(mode: LoginMode) -> &'static str {
	match mode {
		LoginMode::Qr => "QR session logged out",
		LoginMode::Pairing => "Pairing session logged out",
	}
}

/// State of one connection attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
	kind: AttemptKind,
	phase: Phase,
	code_scheduled: bool,
	code_requested: bool,
	connection_ready: bool,
	installed: bool,
	issued_code: Option<String>,
	/// Only pairing attempts have a caller waiting on a settlement.
	settled: bool,
	/// The connection reported close; only code, grace and deadline inputs still apply.
	closed: bool,
	finished: bool,
}

impl Attempt {
	pub fn new(kind: AttemptKind) -> Self {
		let settled = !matches!(kind, AttemptKind::Pairing { .. });
		Self {
			kind,
			phase: Phase::Idle,
			code_scheduled: false,
			code_requested: false,
			connection_ready: false,
			installed: false,
			issued_code: None,
			settled,
			closed: false,
			finished: false,
		}
	}

	pub fn kind(&self) -> &AttemptKind {
		&self.kind
	}

	pub fn mode(&self) -> LoginMode {
		self.kind.mode()
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn is_finished(&self) -> bool {
		self.finished
	}

	pub fn handle(&mut self, input: Input) -> Vec<Effect> {
		let mut effects = Vec::new();
		if self.finished || (self.closed && input.is_connection_input()) {
			return effects;
		}

		match input {
			Input::Qr(payload) => {
				if self.kind == AttemptKind::Qr && !self.connection_ready {
					self.phase = Phase::Challenging;
					effects.push(Effect::PresentQr(payload));
				}
			}
			Input::Connecting => {
				if self.phase == Phase::Idle {
					self.phase = Phase::Connecting;
				}
				let wants_code = matches!(self.kind, AttemptKind::Pairing { .. });
				if wants_code && !self.code_scheduled && !self.code_requested && !self.connection_ready {
					self.code_scheduled = true;
					effects.push(Effect::ScheduleCodeRequest);
				}
			}
			Input::CodeDelayElapsed => {
				if let AttemptKind::Pairing { number } = &self.kind {
					if !self.code_requested && !self.connection_ready {
						self.code_requested = true;
						self.phase = Phase::Challenging;
						effects.push(Effect::RequestCode(number.clone()));
					}
				}
			}
			Input::CodeIssued(code) => {
				self.issued_code = Some(code.clone());
				effects.push(Effect::Publish(LifecycleEvent::PairingCode { code }));
				if !self.connection_ready {
					effects.push(Effect::ScheduleGrace);
				}
			}
			Input::CodeFailed(message) => {
				effects.push(Effect::Publish(LifecycleEvent::Error {
					mode: self.mode(),
					message: format!("Failed to get pairing code: {message}"),
				}));
				if !self.connection_ready {
					self.settle(&mut effects, Settlement::CodeFailed(message));
				}
			}
			Input::GraceElapsed => {
				if !self.connection_ready {
					if let Some(code) = self.issued_code.clone() {
						self.settle(&mut effects, Settlement::CodeIssued(code));
					}
				}
			}
			Input::DeadlineElapsed => {
				if !self.connection_ready && !self.settled {
					self.settle(&mut effects, Settlement::TimedOut);
					if !self.closed {
						self.phase = Phase::Closing(CloseKind::Terminal);
						effects.push(Effect::CloseConnection);
					}
					self.finished = true;
					effects.push(Effect::Finish);
				}
			}
			Input::Open { user } => {
				if self.connection_ready {
					return effects;
				}
				self.connection_ready = true;
				self.installed = true;
				self.phase = Phase::Open;
				let identity = user.as_ref().map(identity_from_user);
				effects.push(Effect::Install(identity.clone()));
				effects.push(Effect::Publish(LifecycleEvent::Authenticated {
					mode: self.mode(),
					identity: identity.unwrap_or_else(anonymous_identity),
				}));
				self.settle(&mut effects, Settlement::Authenticated);
			}
			Input::Close { status } => self.close(&mut effects, status),
		}

		if self.closed && self.settled && !self.finished {
			self.finished = true;
			effects.push(Effect::Finish);
		}
		effects
	}

	fn close(&mut self, effects: &mut Vec<Effect>, status: Option<u16>) {
		let kind = classify_close(status);
		self.phase = Phase::Closing(kind);
		self.closed = true;

		if self.installed {
			effects.push(Effect::ClearSlot);
		}

		if self.kind == AttemptKind::DirectPairing {
			let code = status.map_or_else(|| "unknown".to_string(), |c| c.to_string());
			effects.push(Effect::Publish(LifecycleEvent::Disconnected {
				mode: self.mode(),
				reason: format!("Pairing disconnected (code: {code})"),
			}));
			return;
		}

		if kind == CloseKind::Terminal {
			effects.push(Effect::Publish(LifecycleEvent::Disconnected {
				mode: self.mode(),
				reason: logged_out_reason(self.mode()).to_string(),
			}));
		}
		if !self.code_requested {
			self.settle(effects, Settlement::Closed(status));
		} else if !self.settled {
			effects.push(Effect::Detach);
		}
		if kind == CloseKind::Recoverable {
			effects.push(Effect::ScheduleRestart);
		}
	}

	fn settle(&mut self, effects: &mut Vec<Effect>, settlement: Settlement) {
		if !self.settled {
			self.settled = true;
			effects.push(Effect::Settle(settlement));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pairing() -> Attempt {
		Attempt::new(AttemptKind::Pairing {
			number: "15551234567".into(),
		})
	}

	fn user() -> UserRecord {
		UserRecord {
			id: "15551234567:3@s.whatsapp.net".into(),
			name: Some("Ana".into()),
		}
	}

	fn identity() -> SessionIdentity {
		SessionIdentity {
			display_name: "Ana".into(),
			numeric_id: "15551234567".into(),
		}
	}

	#[test]
	fn repeated_connecting_schedules_one_code_request() {
		let mut attempt = pairing();
		assert_eq!(attempt.handle(Input::Connecting), vec![Effect::ScheduleCodeRequest]);
		assert!(attempt.handle(Input::Connecting).is_empty());
		assert_eq!(attempt.handle(Input::CodeDelayElapsed), vec![Effect::RequestCode("15551234567".into())]);
		assert!(attempt.handle(Input::Connecting).is_empty());
		assert!(attempt.handle(Input::CodeDelayElapsed).is_empty());
		assert_eq!(attempt.phase(), Phase::Challenging);
	}

	#[test]
	fn no_code_request_once_open() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		attempt.handle(Input::Open { user: Some(user()) });
		assert!(attempt.handle(Input::CodeDelayElapsed).is_empty());
	}

	#[test]
	fn open_installs_publishes_and_settles() {
		let mut attempt = pairing();
		let effects = attempt.handle(Input::Open { user: Some(user()) });
		assert_eq!(
			effects,
			vec![
				Effect::Install(Some(identity())),
				Effect::Publish(LifecycleEvent::Authenticated {
					mode: LoginMode::Pairing,
					identity: identity(),
				}),
				Effect::Settle(Settlement::Authenticated),
			]
		);
		assert!(attempt.handle(Input::Open { user: Some(user()) }).is_empty());
		assert!(attempt.handle(Input::GraceElapsed).is_empty());
		assert!(attempt.handle(Input::DeadlineElapsed).is_empty());
	}

	#[test]
	fn open_without_user_installs_anonymous() {
		let mut attempt = Attempt::new(AttemptKind::Qr);
		let effects = attempt.handle(Input::Open { user: None });
		assert_eq!(effects[0], Effect::Install(None));
		assert_eq!(
			effects[1],
			Effect::Publish(LifecycleEvent::Authenticated {
				mode: LoginMode::Qr,
				identity: anonymous_identity(),
			})
		);
		assert_eq!(effects.len(), 2);
	}

	#[test]
	fn issued_code_then_grace_settles_with_code() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		attempt.handle(Input::CodeDelayElapsed);
		assert_eq!(
			attempt.handle(Input::CodeIssued("ABCD-1234".into())),
			vec![
				Effect::Publish(LifecycleEvent::PairingCode { code: "ABCD-1234".into() }),
				Effect::ScheduleGrace,
			]
		);
		assert_eq!(
			attempt.handle(Input::GraceElapsed),
			vec![Effect::Settle(Settlement::CodeIssued("ABCD-1234".into()))]
		);
		// Settled callers are not answered twice; the session may still authenticate.
		let effects = attempt.handle(Input::Open { user: Some(user()) });
		assert!(!effects.iter().any(|e| matches!(e, Effect::Settle(_))));
		assert!(effects.contains(&Effect::Install(Some(identity()))));
	}

	#[test]
	fn code_failure_publishes_and_rejects() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		attempt.handle(Input::CodeDelayElapsed);
		assert_eq!(
			attempt.handle(Input::CodeFailed("rate limited".into())),
			vec![
				Effect::Publish(LifecycleEvent::Error {
					mode: LoginMode::Pairing,
					message: "Failed to get pairing code: rate limited".into(),
				}),
				Effect::Settle(Settlement::CodeFailed("rate limited".into())),
			]
		);
	}

	#[test]
	fn close_before_code_rejects_and_restarts() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		assert_eq!(
			attempt.handle(Input::Close { status: Some(428) }),
			vec![
				Effect::Settle(Settlement::Closed(Some(428))),
				Effect::ScheduleRestart,
				Effect::Finish,
			]
		);
		assert!(attempt.is_finished());
		assert!(attempt.handle(Input::CodeDelayElapsed).is_empty());
	}

	#[test]
	fn close_after_code_waits_for_grace() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		attempt.handle(Input::CodeDelayElapsed);
		attempt.handle(Input::CodeIssued("ABCD-1234".into()));
		assert_eq!(
			attempt.handle(Input::Close { status: Some(515) }),
			vec![Effect::Detach, Effect::ScheduleRestart]
		);
		assert!(!attempt.is_finished());
		assert_eq!(
			attempt.handle(Input::GraceElapsed),
			vec![Effect::Settle(Settlement::CodeIssued("ABCD-1234".into())), Effect::Finish]
		);
		assert!(attempt.is_finished());
	}

	#[test]
	fn close_while_code_in_flight_keeps_caller_waiting() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		attempt.handle(Input::CodeDelayElapsed);
		assert_eq!(
			attempt.handle(Input::Close { status: Some(515) }),
			vec![Effect::Detach, Effect::ScheduleRestart]
		);
		assert!(attempt.handle(Input::Connecting).is_empty());
		assert!(attempt.handle(Input::Close { status: None }).is_empty());
		assert_eq!(
			attempt.handle(Input::CodeIssued("LATE-0001".into())),
			vec![
				Effect::Publish(LifecycleEvent::PairingCode { code: "LATE-0001".into() }),
				Effect::ScheduleGrace,
			]
		);
		assert_eq!(
			attempt.handle(Input::GraceElapsed),
			vec![Effect::Settle(Settlement::CodeIssued("LATE-0001".into())), Effect::Finish]
		);
	}

	#[test]
	fn late_code_failure_after_close_rejects() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		attempt.handle(Input::CodeDelayElapsed);
		attempt.handle(Input::Close { status: Some(428) });
		let effects = attempt.handle(Input::CodeFailed("closed".into()));
		assert_eq!(
			&effects[1..],
			&[Effect::Settle(Settlement::CodeFailed("closed".into())), Effect::Finish]
		);
	}

	#[test]
	fn deadline_after_close_rejects_without_closing_again() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		attempt.handle(Input::CodeDelayElapsed);
		attempt.handle(Input::Close { status: Some(408) });
		assert_eq!(
			attempt.handle(Input::DeadlineElapsed),
			vec![Effect::Settle(Settlement::TimedOut), Effect::Finish]
		);
	}

	#[test]
	fn logged_out_close_after_open_is_terminal() {
		let mut attempt = Attempt::new(AttemptKind::Qr);
		attempt.handle(Input::Qr("2@payload".into()));
		attempt.handle(Input::Open { user: Some(user()) });
		assert_eq!(
			attempt.handle(Input::Close { status: Some(401) }),
			vec![
				Effect::ClearSlot,
				Effect::Publish(LifecycleEvent::Disconnected {
					mode: LoginMode::Qr,
					reason: "QR session logged out".into(),
				}),
				Effect::Finish,
			]
		);
		assert_eq!(attempt.phase(), Phase::Closing(CloseKind::Terminal));
	}

	#[test]
	fn recoverable_close_never_clears_uninstalled_slot() {
		for status in [None, Some(408), Some(428), Some(440), Some(500), Some(515)] {
			let mut attempt = Attempt::new(AttemptKind::Qr);
			attempt.handle(Input::Qr("2@payload".into()));
			assert_eq!(
				attempt.handle(Input::Close { status }),
				vec![Effect::ScheduleRestart, Effect::Finish],
				"{status:?}"
			);
		}
	}

	#[test]
	fn deadline_rejects_and_closes_connection() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		assert_eq!(
			attempt.handle(Input::DeadlineElapsed),
			vec![
				Effect::Settle(Settlement::TimedOut),
				Effect::CloseConnection,
				Effect::Finish,
			]
		);
		assert!(attempt.handle(Input::Close { status: None }).is_empty());
	}

	#[test]
	fn deadline_after_grace_settlement_is_ignored() {
		let mut attempt = pairing();
		attempt.handle(Input::Connecting);
		attempt.handle(Input::CodeDelayElapsed);
		attempt.handle(Input::CodeIssued("ABCD-1234".into()));
		attempt.handle(Input::GraceElapsed);
		assert!(attempt.handle(Input::DeadlineElapsed).is_empty());
	}

	#[test]
	fn direct_pairing_close_reports_code_and_stays_down() {
		let mut attempt = Attempt::new(AttemptKind::DirectPairing);
		assert!(attempt.handle(Input::Connecting).is_empty());
		attempt.handle(Input::Open { user: Some(user()) });
		assert_eq!(
			attempt.handle(Input::Close { status: Some(515) }),
			vec![
				Effect::ClearSlot,
				Effect::Publish(LifecycleEvent::Disconnected {
					mode: LoginMode::Pairing,
					reason: "Pairing disconnected (code: 515)".into(),
				}),
				Effect::Finish,
			]
		);
	}

	#[test]
	fn qr_payload_ignored_outside_qr_mode() {
		let mut attempt = pairing();
		assert!(attempt.handle(Input::Qr("2@payload".into())).is_empty());
		let mut attempt = Attempt::new(AttemptKind::Qr);
		assert_eq!(attempt.handle(Input::Qr("2@payload".into())), vec![Effect::PresentQr("2@payload".into())]);
	}
}
