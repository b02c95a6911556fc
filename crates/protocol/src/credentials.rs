//! Opaque credential material exchanged with the transport engine.
//!
//! The lifecycle core never inspects these values; it only hands the loaded
//! state to the engine and forwards update notifications to the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Credential material for one session directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialState {
	/// Registration/identity record; `None` before the first successful login.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub creds: Option<Value>,
	/// Signal key material keyed by `<category>-<id>`.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub keys: BTreeMap<String, Value>,
}

/// A change the engine wants persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialUpdate {
	/// Top-level fields to merge into the creds record.
	Creds { patch: Value },
	/// Key entries to write (`Some`) or delete (`None`) within one category.
	Keys {
		category: String,
		entries: BTreeMap<String, Option<Value>>,
	},
}
