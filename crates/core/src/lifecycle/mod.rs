//! Connection lifecycle: per-attempt state machine, reconnection policy and
//! the per-mode manager that drives both.

mod machine;
mod manager;
mod policy;

pub use machine::{Attempt, AttemptKind, Effect, Input, Phase, Settlement};
pub use manager::{Collaborators, LifecycleManager, PairingOutcome};
pub use policy::{CloseKind, Timings, classify_close, socket_config};
