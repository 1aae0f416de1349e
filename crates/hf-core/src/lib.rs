//! Core types and utilities for hf-mcp
//!
//! # Modules
//!
//! - `config`: Broker configuration and env-file loading
//! - `error`: Error taxonomy, stable codes and the translated `ErrorReport`
//! - `types`: Records, task kinds and content blocks shared by every crate

pub mod config;
pub mod error;
pub mod types;

// Re-exports
pub use config::BrokerConfig;
pub use error::{Error, ErrorReport, RemoteFailure, Result};
pub use types::*;
