//! Election daemon library
//!
//! Headless host for the election runtime:
//! - Layered configuration (defaults, file, environment)
//! - State restore on startup and periodic autosave
//! - Evaluation and activity tickers
//! - Save on shutdown

pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use server::Server;
