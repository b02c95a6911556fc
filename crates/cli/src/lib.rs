//! Process edge of the wa-rs gateway: CLI parsing, configuration, logging and
//! the HTTP/WebSocket server.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
