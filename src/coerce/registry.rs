//! coerce::registry
//!
//! Name-to-strategy lookup, constructed at startup and passed by handle.

use std::collections::HashMap;
use std::sync::Arc;

use super::strategies::{Composite, ExactMatch, MeasurableToNumber, StorageWiden};
use super::{CoerceError, CoercionStrategy};

/// Shared handle to one registered strategy.
pub type StrategyHandle = Arc<dyn CoercionStrategy + Send + Sync>;

/// Explicit strategy registry.
///
/// Write-once at startup, read-many thereafter. Tests construct isolated
/// registries; nothing here is process-global.
#[derive(Default)]
pub struct CoercionRegistry {
    strategies: HashMap<String, StrategyHandle>,
}

impl CoercionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in strategies: `exact`, `widen`,
    /// `measurable`, and the `composite` chain over the three.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ExactMatch));
        registry.register(Arc::new(StorageWiden));
        registry.register(Arc::new(MeasurableToNumber));
        registry.register(Arc::new(Composite::default_chain()));
        registry
    }

    /// Register a strategy under its own name, replacing any previous
    /// registration with that name.
    pub fn register(&mut self, strategy: StrategyHandle) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    /// Look up a strategy by name.
    pub fn get(&self, name: &str) -> Result<StrategyHandle, CoerceError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| CoerceError::UnknownStrategy { name: name.into() })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::CoercionContext;
    use crate::core::types::{ParamValue, StorageKind};

    #[test]
    fn builtins_registered() {
        let registry = CoercionRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["composite", "exact", "measurable", "widen"]
        );
    }

    #[test]
    fn unknown_name_errors() {
        let registry = CoercionRegistry::with_builtins();
        let err = registry.get("bespoke").unwrap_err();
        assert!(matches!(err, CoerceError::UnknownStrategy { name } if name == "bespoke"));
    }

    #[test]
    fn custom_strategy_extends_the_chain() {
        struct AlwaysZero;
        impl CoercionStrategy for AlwaysZero {
            fn name(&self) -> &str {
                "zero"
            }
            fn can_map(&self, _ctx: &CoercionContext) -> bool {
                true
            }
            fn map(&self, _ctx: &CoercionContext) -> Result<ParamValue, CoerceError> {
                Ok(ParamValue::Integer(0))
            }
        }

        let mut registry = CoercionRegistry::with_builtins();
        registry.register(Arc::new(AlwaysZero));

        let strategy = registry.get("zero").unwrap();
        let ctx = CoercionContext::plain(ParamValue::Text("anything".into()), StorageKind::Integer);
        assert_eq!(strategy.map(&ctx).unwrap(), ParamValue::Integer(0));
    }

    #[test]
    fn registration_by_name_replaces() {
        struct LoudExact;
        impl CoercionStrategy for LoudExact {
            fn name(&self) -> &str {
                "exact"
            }
            fn can_map(&self, _ctx: &CoercionContext) -> bool {
                true
            }
            fn map(&self, ctx: &CoercionContext) -> Result<ParamValue, CoerceError> {
                Ok(ctx.value.clone())
            }
        }

        let mut registry = CoercionRegistry::with_builtins();
        registry.register(Arc::new(LoudExact));

        // The replacement accepts a context the built-in refuses.
        let ctx = CoercionContext::plain(ParamValue::Integer(1), StorageKind::Double);
        assert!(registry.get("exact").unwrap().can_map(&ctx));
    }
}
