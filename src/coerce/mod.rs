//! coerce
//!
//! The parameter value coercion chain.
//!
//! # Architecture
//!
//! Assignment requests arrive as heterogeneous values (raw numbers, free
//! text, internal-unit measurables) and must land in parameters with fixed
//! storage kinds. A [`CoercionStrategy`] maps one source value to a value
//! the target storage accepts; strategies are looked up by name in an
//! explicit [`registry::CoercionRegistry`] constructed at startup and passed
//! by reference into whatever needs lookup. No hidden global state.
//!
//! The registry is open: callers register custom strategies by name at
//! runtime to extend coercion without modifying the built-in chain.
//!
//! # Invariants
//!
//! - `map` on a context for which `can_map` returned `true` may still fail
//!   (e.g. unparseable free text discovered during the actual parse); `map`
//!   on a `can_map == false` context always fails
//! - Strategies are stateless; one instance serves every lookup
//! - Measurable sources are in internal SI units (kilograms, meters, volts)

pub mod registry;
pub mod strategies;

use thiserror::Error;

use crate::core::types::{ParamValue, Quantity, StorageKind};

pub use registry::{CoercionRegistry, StrategyHandle};
pub use strategies::{Composite, ExactMatch, MeasurableToNumber, StorageWiden};

/// Errors from coercion.
#[derive(Debug, Error)]
pub enum CoerceError {
    /// No strategy (or no composite delegate) accepted the context.
    #[error("no coercion from {value} ({quantity}) to {target} storage")]
    NoStrategy {
        /// Source value, rendered
        value: String,
        /// Source quantity
        quantity: Quantity,
        /// Target storage kind
        target: StorageKind,
    },

    /// Free text could not be read as a number.
    #[error("cannot parse '{text}' as a number")]
    Unparseable {
        /// The offending text
        text: String,
    },

    /// Registry lookup failed.
    #[error("unknown coercion strategy: {name}")]
    UnknownStrategy {
        /// The requested strategy name
        name: String,
    },
}

/// One coercion request: a source value headed for a target storage.
#[derive(Debug, Clone)]
pub struct CoercionContext {
    /// Source value. Internal SI units when `quantity` is measurable.
    pub value: ParamValue,
    /// What the source value measures.
    pub quantity: Quantity,
    /// Storage kind the target parameter requires.
    pub target_storage: StorageKind,
}

impl CoercionContext {
    /// A plain (non-measurable) coercion request.
    pub fn plain(value: ParamValue, target_storage: StorageKind) -> Self {
        Self {
            value,
            quantity: Quantity::Plain,
            target_storage,
        }
    }

    /// A measurable coercion request; `value` is in internal SI units.
    pub fn measurable(value: ParamValue, quantity: Quantity, target_storage: StorageKind) -> Self {
        Self {
            value,
            quantity,
            target_storage,
        }
    }

    pub(crate) fn no_strategy(&self) -> CoerceError {
        CoerceError::NoStrategy {
            value: self.value.to_string(),
            quantity: self.quantity,
            target: self.target_storage,
        }
    }
}

/// Maps a source value to one the target storage accepts.
pub trait CoercionStrategy {
    /// Registry key and display name.
    fn name(&self) -> &str;

    /// Whether this strategy is willing to attempt the mapping.
    fn can_map(&self, ctx: &CoercionContext) -> bool;

    /// Perform the mapping.
    fn map(&self, ctx: &CoercionContext) -> Result<ParamValue, CoerceError>;
}

impl std::fmt::Debug for dyn CoercionStrategy + Send + Sync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoercionStrategy")
            .field("name", &self.name())
            .finish()
    }
}
