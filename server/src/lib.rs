//! Reflect server library.
//!
//! Wires the signaling server (`reflect-api`) to a single media session
//! (`reflect-webrtc`). The binary in `main.rs` only parses arguments, sets up
//! logging and hands over to [`app::run`].

pub mod app;
pub mod config;
pub mod logging;

pub use app::{run, Outcome};
pub use config::{CliArgs, LoggingConfig, ServerConfig};
