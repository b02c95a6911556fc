//! Live session handles and identity derivation.

use std::fmt;
use std::sync::Arc;

use wa_protocol::{LoginMode, SessionIdentity, UserRecord};
use wa_runtime::Connection;

/// Display name used when the account advertises none.
pub const UNNAMED: &str = "Unnamed";

/// One live connection plus the identity it authenticated as.
///
/// Handles are replaced, never mutated, when a mode reconnects.
#[derive(Clone)]
pub struct SessionHandle {
	pub mode: LoginMode,
	/// Attempt that installed this handle.
	pub attempt: u64,
	pub connection: Arc<dyn Connection>,
	pub identity: Option<SessionIdentity>,
}

impl fmt::Debug for SessionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionHandle")
			.field("mode", &self.mode)
			.field("attempt", &self.attempt)
			.field("identity", &self.identity)
			.finish_non_exhaustive()
	}
}

/// Builds the display identity from the account record a connection advertises.
///
/// `15551234567:12@s.whatsapp.net` yields numeric id `15551234567`.
pub fn identity_from_user(user: &UserRecord) -> SessionIdentity {
	let display_name = match user.name.as_deref() {
		Some(name) if !name.is_empty() => name.to_string(),
		_ => UNNAMED.to_string(),
	};
	let numeric_id = user
		.id
		.split(':')
		.next()
		.and_then(|head| head.split('@').next())
		.unwrap_or_default()
		.to_string();
	SessionIdentity { display_name, numeric_id }
}

/// Identity reported when the connection has no account record at all.
pub fn anonymous_identity() -> SessionIdentity {
	SessionIdentity {
		display_name: UNNAMED.to_string(),
		numeric_id: String::new(),
	}
}
