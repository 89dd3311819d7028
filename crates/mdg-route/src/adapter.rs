//! Request-response provider seam.
//!
//! A [`ProviderAdapter`] wraps one broker's REST API. The router only sees
//! this trait, the [`Request`] model, and [`ProviderError`].

use async_trait::async_trait;
use mdg_core::types::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    /// Error payload returned by the provider.
    #[error("provider error: {message}")]
    Provider { message: String },

    /// Refused locally; nothing was sent.
    #[error("rejected: {message}")]
    Rejected { message: String },
}

impl ProviderError {
    /// Whether the call may have consumed provider quota.
    pub fn reached_wire(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    pub fn unsupported(operation: Operation) -> Self {
        Self::Rejected { message: format!("{operation} is not supported") }
    }
}

/// One logical request-response operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Request {
    Quote { symbol: String },
    MultipleQuotes { symbols: Vec<String> },
    Historical { symbol: String, from: String, to: String, interval: String },
    OptionChain { symbol: String, expiry: Option<String> },
    MarketStatus { exchange: Option<String> },
}

impl Request {
    pub fn quote(symbol: impl Into<String>) -> Self {
        Self::Quote { symbol: symbol.into() }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Quote { .. } => Operation::Quote,
            Self::MultipleQuotes { .. } => Operation::MultipleQuotes,
            Self::Historical { .. } => Operation::Historical,
            Self::OptionChain { .. } => Operation::OptionChain,
            Self::MarketStatus { .. } => Operation::MarketStatus,
        }
    }
}

/// A request-response market data provider.
///
/// Operations a provider does not implement are refused locally, so they
/// never consume quota.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Unique provider name, e.g. `"upstox"`.
    fn name(&self) -> &str;

    fn capabilities(&self) -> &[Operation];

    fn supports(&self, operation: Operation) -> bool {
        self.capabilities().contains(&operation)
    }

    async fn get_quote(&self, _symbol: &str) -> Result<Value, ProviderError> {
        Err(ProviderError::unsupported(Operation::Quote))
    }

    async fn get_multiple_quotes(&self, _symbols: &[String]) -> Result<Value, ProviderError> {
        Err(ProviderError::unsupported(Operation::MultipleQuotes))
    }

    async fn get_historical_data(
        &self,
        _symbol: &str,
        _from: &str,
        _to: &str,
        _interval: &str,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::unsupported(Operation::Historical))
    }

    async fn get_option_chain(&self, _symbol: &str, _expiry: Option<&str>) -> Result<Value, ProviderError> {
        Err(ProviderError::unsupported(Operation::OptionChain))
    }

    async fn get_market_status(&self, _exchange: Option<&str>) -> Result<Value, ProviderError> {
        Err(ProviderError::unsupported(Operation::MarketStatus))
    }
}

/// Invoke the adapter method matching `request`.
pub async fn dispatch(adapter: &dyn ProviderAdapter, request: &Request) -> Result<Value, ProviderError> {
    match request {
        Request::Quote { symbol } => adapter.get_quote(symbol).await,
        Request::MultipleQuotes { symbols } => adapter.get_multiple_quotes(symbols).await,
        Request::Historical { symbol, from, to, interval } => {
            adapter.get_historical_data(symbol, from, to, interval).await
        }
        Request::OptionChain { symbol, expiry } => adapter.get_option_chain(symbol, expiry.as_deref()).await,
        Request::MarketStatus { exchange } => adapter.get_market_status(exchange.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct QuoteOnly;

    #[async_trait]
    impl ProviderAdapter for QuoteOnly {
        fn name(&self) -> &str {
            "quote-only"
        }

        fn capabilities(&self) -> &[Operation] {
            &[Operation::Quote]
        }

        async fn get_quote(&self, symbol: &str) -> Result<Value, ProviderError> {
            Ok(json!({ "symbol": symbol, "ltp": 101.5 }))
        }
    }

    #[tokio::test]
    async fn dispatch_routes_by_request_kind() {
        let data = dispatch(&QuoteOnly, &Request::quote("INFY")).await.unwrap();
        assert_eq!(data["symbol"], "INFY");

        let err = dispatch(&QuoteOnly, &Request::MarketStatus { exchange: None }).await.unwrap_err();
        assert!(!err.reached_wire());
    }

    #[test]
    fn request_serializes_with_operation_tag() {
        let req: Request = serde_json::from_str(r#"{"operation":"option_chain","symbol":"NIFTY","expiry":null}"#).unwrap();
        assert_eq!(req.operation(), Operation::OptionChain);
        assert!(ProviderError::Timeout(10).reached_wire());
    }
}
