//! Wire and data types for the wa-rs session gateway.
//!
//! This crate contains the serde-serializable types shared by the lifecycle
//! core, the transport bridge and the HTTP layer. These types represent the
//! "protocol layer" - the shapes of data as they cross a process or crate
//! boundary.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and trivial accessors
//! * Stable: Changes only when a wire format changes
//!
//! Session orchestration is built on top of these types in `wa-rs`.

pub mod bridge;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod event;
pub mod http;
pub mod mode;

pub use bridge::*;
pub use config::*;
pub use connection::*;
pub use credentials::*;
pub use event::*;
pub use http::*;
pub use mode::*;
