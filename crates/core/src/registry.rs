//! Process-wide table of the live session per login mode.

use std::collections::HashMap;

use parking_lot::RwLock;
use wa_protocol::{LoginMode, SlotStatus, StatusReport};

use crate::session::SessionHandle;

/// Mode to [`SessionHandle`] table; the single source of truth for "is mode X logged in".
///
/// Only the manager of a mode writes its slot.
#[derive(Debug, Default)]
pub struct SessionRegistry {
	slots: RwLock<HashMap<LoginMode, SessionHandle>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, mode: LoginMode) -> Option<SessionHandle> {
		self.slots.read().get(&mode).cloned()
	}

	/// Installs `handle` in its mode's slot, returning whatever it replaced.
	pub fn set(&self, handle: SessionHandle) -> Option<SessionHandle> {
		self.slots.write().insert(handle.mode, handle)
	}

	pub fn clear(&self, mode: LoginMode) -> Option<SessionHandle> {
		self.slots.write().remove(&mode)
	}

	/// Clears the slot only if it still holds the handle installed by `attempt`.
	pub fn clear_if(&self, mode: LoginMode, attempt: u64) -> bool {
		let mut slots = self.slots.write();
		if slots.get(&mode).is_some_and(|handle| handle.attempt == attempt) {
			slots.remove(&mode);
			true
		} else {
			false
		}
	}

	pub fn is_active(&self, mode: LoginMode) -> bool {
		self.slots.read().contains_key(&mode)
	}

	pub fn status(&self) -> StatusReport {
		let slots = self.slots.read();
		StatusReport {
			qr: SlotStatus::from_present(slots.contains_key(&LoginMode::Qr)),
			pairing: SlotStatus::from_present(slots.contains_key(&LoginMode::Pairing)),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use wa_protocol::CredentialState;
	use wa_runtime::TransportEngine;
	use wa_runtime::fake::FakeEngine;

	use super::*;

	async fn handle(mode: LoginMode, attempt: u64) -> SessionHandle {
		let (engine, _controller) = FakeEngine::new();
		let config = crate::lifecycle::socket_config(&crate::lifecycle::AttemptKind::Qr, &crate::lifecycle::Timings::default());
		let opened = engine.open(config, CredentialState::default()).await.unwrap();
		SessionHandle {
			mode,
			attempt,
			connection: Arc::clone(&opened.connection),
			identity: None,
		}
	}

	#[tokio::test]
	async fn clear_if_ignores_other_attempts() {
		let registry = SessionRegistry::new();
		registry.set(handle(LoginMode::Qr, 1).await);

		assert!(!registry.clear_if(LoginMode::Qr, 2));
		assert!(registry.is_active(LoginMode::Qr));
		assert!(registry.clear_if(LoginMode::Qr, 1));
		assert!(registry.get(LoginMode::Qr).is_none());
	}

	#[tokio::test]
	async fn status_reflects_slot_presence() {
		let registry = SessionRegistry::new();
		registry.set(handle(LoginMode::Pairing, 1).await);

		let status = registry.status();
		assert_eq!(status.qr, SlotStatus::Disconnected);
		assert_eq!(status.pairing, SlotStatus::Connected);
	}

	#[tokio::test]
	async fn set_replaces_previous_handle() {
		let registry = SessionRegistry::new();
		assert!(registry.set(handle(LoginMode::Qr, 1).await).is_none());
		let previous = registry.set(handle(LoginMode::Qr, 2).await).unwrap();
		assert_eq!(previous.attempt, 1);
		assert_eq!(registry.get(LoginMode::Qr).unwrap().attempt, 2);
	}
}
