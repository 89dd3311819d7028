//! Adapter registry: provider → protocol adapter.

use std::sync::Arc;

use ahash::AHashMap;
use mdg_core::types::Provider;

use crate::flattrade::FlattradeAdapter;
use crate::fyers::FyersAdapter;
use crate::protocol::ProtocolAdapter;
use crate::upstox::UpstoxAdapter;

/// Create the built-in adapter for `provider`.
pub fn create_adapter(provider: Provider) -> Arc<dyn ProtocolAdapter> {
    match provider {
        Provider::Upstox => Arc::new(UpstoxAdapter),
        Provider::Flattrade => Arc::new(FlattradeAdapter),
        Provider::Fyers => Arc::new(FyersAdapter),
    }
}

/// Adapters available to a supervisor.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: AHashMap<Provider, Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in adapter.
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        for p in Provider::ALL {
            reg.register(create_adapter(p));
        }
        reg
    }

    /// Add or replace the adapter for its provider.
    pub fn register(&mut self, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn ProtocolAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    pub fn providers(&self) -> Vec<Provider> {
        let mut out: Vec<_> = self.adapters.keys().copied().collect();
        out.sort_by_key(|p| p.as_str());
        out
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry").field("providers", &self.providers()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_provider() {
        let reg = AdapterRegistry::with_defaults();
        for p in Provider::ALL {
            assert_eq!(reg.get(p).map(|a| a.provider()), Some(p));
        }
        assert!(AdapterRegistry::new().get(Provider::Fyers).is_none());
    }
}
