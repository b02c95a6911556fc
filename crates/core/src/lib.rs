//! Dual-session messaging lifecycle manager.
//!
//! Two independent login flows, QR scan and phone-number pairing code, each
//! own one restartable connection to the messaging network. This crate drives
//! those connections through their lifecycle, keeps a registry of the live
//! session per mode, and broadcasts lifecycle events to observers.
//!
//! # Layout
//!
//! * [`lifecycle`]: the per-attempt state machine and the per-mode manager
//! * [`registry`]: mode to live [`SessionHandle`] table
//! * [`bus`]: fan-out of [`LifecycleEvent`]s
//! * [`gateway`]: the facade the HTTP layer calls
//!
//! The transport engine and credential store are injected through the traits
//! in `wa-runtime`.

pub mod bus;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod phone;
pub mod qr;
pub mod registry;
pub mod session;

pub use bus::{EventBus, LifecycleObserver, ObserverId};
pub use error::{Error, Result};
pub use gateway::{Gateway, GatewayBuilder};
pub use lifecycle::{LifecycleManager, PairingOutcome, Timings};
pub use phone::PhoneNumber;
pub use qr::{DataUrlRenderer, QrRenderer};
pub use registry::SessionRegistry;
pub use session::SessionHandle;
pub use wa_protocol::{LifecycleEvent, LoginMode, SessionIdentity};
