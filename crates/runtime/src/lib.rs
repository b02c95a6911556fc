//! External-collaborator plumbing for the wa-rs session gateway.
//!
//! The lifecycle core in `wa-rs` talks to the outside world through two seams
//! defined here:
//!
//! * [`TransportEngine`] / [`Connection`]: opens a connection to the messaging
//!   network and streams [`EngineEvent`]s back.
//! * [`CredentialStore`]: loads a session directory and returns a persist
//!   callback for credential updates.
//!
//! [`BridgeEngine`] implements the engine seam against a protocol sidecar
//! reached over WebSocket; [`FileCredentialStore`] is the on-disk store;
//! [`fake::FakeEngine`] is a scriptable in-memory engine for tests.

pub mod bridge;
pub mod creds;
pub mod engine;
mod error;
pub mod fake;

pub use bridge::BridgeEngine;
pub use creds::{CredentialStore, FileCredentialStore, LoadedCredentials, PersistFn};
pub use engine::{BoxFuture, Connection, EngineEvent, OpenedConnection, TransportEngine};
pub use error::{Error, Result};
