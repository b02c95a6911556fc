//! Credential persistence keyed by session directory.
//!
//! [`FileCredentialStore`] lays a session directory out as one `creds.json`
//! holding the registration record plus one `<category>-<id>.json` file per
//! signal key. The lifecycle core never looks inside any of it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use wa_protocol::{CredentialState, CredentialUpdate};

use crate::error::Result;

/// Persist callback registered for the lifetime of one connection.
pub type PersistFn = Box<dyn FnMut(CredentialUpdate) -> Result<()> + Send>;

/// Output of [`CredentialStore::load`].
pub struct LoadedCredentials {
	pub state: CredentialState,
	pub persist: PersistFn,
}

/// Loads and persists per-session credential material.
pub trait CredentialStore: Send + Sync {
	/// Loads the state stored under `dir`, creating the directory if needed.
	fn load(&self, dir: &Path) -> Result<LoadedCredentials>;

	/// Removes everything stored under `dir`.
	///
	/// Returns `Ok(false)` when there was nothing to remove.
	fn clear(&self, dir: &Path) -> Result<bool>;
}

const CREDS_FILE: &str = "creds.json";

/// Multi-file JSON credential store.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCredentialStore;

impl FileCredentialStore {
	pub fn new() -> Self {
		Self
	}
}

impl CredentialStore for FileCredentialStore {
	fn load(&self, dir: &Path) -> Result<LoadedCredentials> {
		fs::create_dir_all(dir)?;

		let mut state = CredentialState::default();
		for entry in fs::read_dir(dir)? {
			let path = entry?.path();
			let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
				continue;
			};
			let Some(stem) = name.strip_suffix(".json") else {
				continue;
			};
			let value: Value = serde_json::from_slice(&fs::read(&path)?)?;
			if name == CREDS_FILE {
				state.creds = Some(value);
			} else {
				state.keys.insert(stem.to_string(), value);
			}
		}
		debug!(target = "wa.creds", dir = %dir.display(), keys = state.keys.len(), registered = state.creds.is_some(), "loaded credentials");

		let mut writer = DirWriter {
			dir: dir.to_path_buf(),
			creds: state.creds.clone(),
		};
		Ok(LoadedCredentials {
			state,
			persist: Box::new(move |update| writer.apply(update)),
		})
	}

	fn clear(&self, dir: &Path) -> Result<bool> {
		match fs::remove_dir_all(dir) {
			Ok(()) => {
				debug!(target = "wa.creds", dir = %dir.display(), "cleared credentials");
				Ok(true)
			}
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err.into()),
		}
	}
}

/// Write side of one loaded directory; owns the merged creds record.
struct DirWriter {
	dir: PathBuf,
	creds: Option<Value>,
}

impl DirWriter {
	fn apply(&mut self, update: CredentialUpdate) -> Result<()> {
		match update {
			CredentialUpdate::Creds { patch } => {
				let merged = merge_shallow(self.creds.take(), patch);
				fs::write(self.dir.join(CREDS_FILE), serde_json::to_vec_pretty(&merged)?)?;
				self.creds = Some(merged);
			}
			CredentialUpdate::Keys { category, entries } => {
				for (id, value) in entries {
					let path = self.dir.join(format!("{}.json", key_file_stem(&category, &id)));
					match value {
						Some(value) => fs::write(&path, serde_json::to_vec(&value)?)?,
						None => match fs::remove_file(&path) {
							Ok(()) => {}
							Err(err) if err.kind() == ErrorKind::NotFound => {}
							Err(err) => return Err(err.into()),
						},
					}
				}
			}
		}
		Ok(())
	}
}

/// Top-level merge: fields of `patch` replace fields of `base`.
fn merge_shallow(base: Option<Value>, patch: Value) -> Value {
	match (base, patch) {
		(Some(Value::Object(mut base)), Value::Object(patch)) => {
			base.extend(patch);
			Value::Object(base)
		}
		(_, patch) => patch,
	}
}

/// File stem for a key entry; path separators and colons are not allowed in ids.
fn key_file_stem(category: &str, id: &str) -> String {
	format!("{category}-{id}").replace('/', "__").replace(':', "-")
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use serde_json::json;

	use super::*;

	#[test]
	fn load_creates_missing_directory() {
		let temp = tempfile::TempDir::new().unwrap();
		let dir = temp.path().join("session_qr");

		let loaded = FileCredentialStore::new().load(&dir).unwrap();

		assert!(dir.is_dir());
		assert_eq!(loaded.state, CredentialState::default());
	}

	#[test]
	fn creds_patches_merge_and_reload() {
		let temp = tempfile::TempDir::new().unwrap();
		let store = FileCredentialStore::new();

		let mut loaded = store.load(temp.path()).unwrap();
		(loaded.persist)(CredentialUpdate::Creds {
			patch: json!({"registrationId": 7, "me": null}),
		})
		.unwrap();
		(loaded.persist)(CredentialUpdate::Creds {
			patch: json!({"me": {"id": "1555:3@s.whatsapp.net"}}),
		})
		.unwrap();

		let reloaded = store.load(temp.path()).unwrap();
		assert_eq!(
			reloaded.state.creds,
			Some(json!({"registrationId": 7, "me": {"id": "1555:3@s.whatsapp.net"}}))
		);
	}

	#[test]
	fn key_updates_write_and_delete_files() {
		let temp = tempfile::TempDir::new().unwrap();
		let store = FileCredentialStore::new();
		let mut loaded = store.load(temp.path()).unwrap();

		let mut entries = BTreeMap::new();
		entries.insert("1".to_string(), Some(json!({"k": "a"})));
		entries.insert("2".to_string(), Some(json!({"k": "b"})));
		(loaded.persist)(CredentialUpdate::Keys {
			category: "pre-key".into(),
			entries,
		})
		.unwrap();

		let mut entries = BTreeMap::new();
		entries.insert("1".to_string(), None);
		entries.insert("missing".to_string(), None);
		(loaded.persist)(CredentialUpdate::Keys {
			category: "pre-key".into(),
			entries,
		})
		.unwrap();

		let reloaded = store.load(temp.path()).unwrap();
		assert_eq!(reloaded.state.keys.len(), 1);
		assert_eq!(reloaded.state.keys.get("pre-key-2"), Some(&json!({"k": "b"})));
	}

	#[test]
	fn key_ids_are_made_file_safe() {
		assert_eq!(key_file_stem("session", "1555:3@s.whatsapp.net"), "session-1555-3@s.whatsapp.net");
		assert_eq!(key_file_stem("sender-key", "a/b"), "sender-key-a__b");
	}

	#[test]
	fn clear_reports_whether_anything_was_removed() {
		let temp = tempfile::TempDir::new().unwrap();
		let dir = temp.path().join("session_pairing");
		let store = FileCredentialStore::new();

		assert!(!store.clear(&dir).unwrap());
		store.load(&dir).unwrap();
		assert!(store.clear(&dir).unwrap());
		assert!(!dir.exists());
	}
}
