//! Typed error definitions for the gateway.
//!
//! [`GatewayError`] covers the whole failure taxonomy: connection lifecycle,
//! realtime message handling, rate limiting, and request routing. All variants
//! implement `std::error::Error` via `thiserror`, so they compose with
//! `anyhow::Result` at the application edge.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::types::{ConnectionStatus, HealthStatus, Operation, WindowKind};

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// One failed attempt inside a routed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptFailure {
    pub provider: String,
    pub error: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

fn join_attempts(attempts: &[AttemptFailure]) -> String {
    attempts.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Domain-specific errors for the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The socket for a new connection could not be constructed or opened.
    #[error("connection '{id}' could not be created: {reason}")]
    ConnectionCreation { id: String, reason: String },

    /// The connection exists but is not in the `connected` state.
    #[error("connection '{id}' is not available (status: {status})")]
    ConnectionUnavailable { id: String, status: ConnectionStatus },

    /// No connection with this id is supervised.
    #[error("unknown connection '{0}'")]
    UnknownConnection(String),

    /// An inbound realtime payload could not be decoded. Non-fatal.
    #[error("invalid message on '{connection_id}': {reason}")]
    InvalidMessage { connection_id: String, reason: String },

    /// A reservation would exceed a per-provider or global quota.
    #[error("rate limit exceeded for '{provider}' ({window} window), resets in {reset_in_ms}ms")]
    RateLimitExceeded { provider: String, window: WindowKind, reset_in_ms: u64 },

    /// A single provider call failed.
    #[error("provider '{provider}' request failed: {cause}")]
    ProviderRequest { provider: String, cause: String },

    /// Every candidate provider failed for one logical request.
    #[error("all providers exhausted for {operation}: [{}]", join_attempts(.attempts))]
    AllProvidersExhausted { operation: Operation, attempts: Vec<AttemptFailure> },

    /// No provider is capable, healthy, and within quota for the operation.
    #[error("no provider available for {operation}")]
    NoProviderAvailable { operation: Operation },

    /// Reconnection gave up after the configured number of attempts.
    #[error("connection '{connection_id}' gave up after {attempts} reconnect attempts")]
    ReconnectExhausted { connection_id: String, attempts: u32 },

    /// An administrative switch targeted a provider that is not healthy.
    #[error("provider '{provider}' is not healthy (status: {status})")]
    ProviderNotHealthy { provider: String, status: HealthStatus },

    /// The provider name is not registered.
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    /// A provider-specific wire payload could not be built.
    #[error("protocol error for '{provider}': {reason}")]
    Protocol { provider: String, reason: String },

    /// WebSocket handshake, send, or close failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_lists_every_attempt() {
        let err = GatewayError::AllProvidersExhausted {
            operation: Operation::Quote,
            attempts: vec![
                AttemptFailure { provider: "upstox".into(), error: "timeout".into() },
                AttemptFailure { provider: "fyers".into(), error: "HTTP 502".into() },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("upstox: timeout"));
        assert!(text.contains("fyers: HTTP 502"));
    }

    #[test]
    fn rate_limit_message_names_window() {
        let err = GatewayError::RateLimitExceeded {
            provider: "flattrade".into(),
            window: WindowKind::Minute,
            reset_in_ms: 1200,
        };
        assert_eq!(err.to_string(), "rate limit exceeded for 'flattrade' (minute window), resets in 1200ms");
    }
}
