//! # mdg-core
//!
//! Core crate for the market-data gateway, providing:
//!
//! - **Types** (`types`) — provider/subscription/health enums, subscription keys, normalized ticks
//! - **Configuration** (`config`) — JSON config deserialization and validation
//! - **Error types** (`error`) — the `GatewayError` taxonomy via thiserror
//! - **WebSocket** (`ws`) — connector seam plus the tokio-tungstenite transport
//! - **Time utilities** (`time_util`) — wall-clock timestamps
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;
pub mod ws;

pub use error::{GatewayError, Result};
// Re-export types at crate root for convenience.
pub use types::*;
