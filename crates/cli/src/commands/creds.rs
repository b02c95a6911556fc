use tracing::info;
use wa_protocol::LoginMode;
use wa_runtime::{CredentialStore, FileCredentialStore};

use crate::config::ServerConfig;
use crate::error::Result;

/// Removes the stored credentials of `mode` under the configured session root.
pub(crate) fn clear(config: &ServerConfig, mode: LoginMode) -> Result<()> {
	let dir = config.session_root.join(mode.session_dir_name());
	let removed = FileCredentialStore::new().clear(&dir)?;
	info!(target = "wa.creds", mode = %mode, dir = %dir.display(), removed, "credential wipe");

	if removed {
		println!("Removed {} credentials at {}", mode, dir.display());
	} else {
		println!("No {} credentials at {}", mode, dir.display());
	}
	Ok(())
}
