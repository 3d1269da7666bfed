//! Suffix allocation strategies for DOI minting.
//!
//! A minter is a pure allocation capability: given a prefix it produces a
//! new suffix. It does not consult the ledger; the ledger's uniqueness
//! constraint is the actual backstop against collisions. Strategies are
//! selected at startup by name through [`MinterRegistry`], never at call
//! time.

#![deny(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Result type for minter operations.
pub type MinterResult<T> = Result<T, MinterError>;

/// Minter-related errors.
#[derive(Debug, Error)]
pub enum MinterError {
    #[error("unknown minter strategy: {0}")]
    UnknownStrategy(String),
}

/// A suffix allocation strategy.
///
/// Implementations must be cheap and side-effect free; collision handling
/// belongs to the ledger, not here.
pub trait SuffixMinter: Send + Sync {
    /// Produce a new suffix for `prefix`.
    fn allocate(&self, prefix: &str) -> String;

    /// Strategy name, as used by the registry and configuration.
    fn name(&self) -> &'static str;
}

/// Default strategy: a random UUIDv4 token. Collision probability is treated
/// as negligible.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidMinter;

impl SuffixMinter for UuidMinter {
    fn allocate(&self, _prefix: &str) -> String {
        Uuid::new_v4().to_string()
    }

    fn name(&self) -> &'static str {
        "uuid"
    }
}

/// Registry of named minting strategies.
///
/// Configuration selects a strategy by name once at startup; callers hold
/// the resolved `Arc<dyn SuffixMinter>` and never go back through the
/// registry on the hot path.
pub struct MinterRegistry {
    strategies: HashMap<String, Arc<dyn SuffixMinter>>,
}

impl MinterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry pre-populated with the built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(UuidMinter));
        registry
    }

    /// Register a strategy under its own name. A later registration under
    /// the same name replaces the earlier one.
    pub fn register(&mut self, minter: Arc<dyn SuffixMinter>) {
        tracing::info!(strategy = minter.name(), "minter strategy registered");
        self.strategies.insert(minter.name().to_string(), minter);
    }

    /// Resolve a strategy by configured name.
    pub fn resolve(&self, name: &str) -> MinterResult<Arc<dyn SuffixMinter>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| MinterError::UnknownStrategy(name.to_string()))
    }

    /// Names of all registered strategies.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}

impl Default for MinterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
