//! ops
//!
//! The stock operations.
//!
//! # Architecture
//!
//! Everything here is an implementation of `engine::op::DocOp` or
//! `engine::op::VariantOp`, wrapped into `engine::op::Operation` values by
//! the constructor functions. The parameter-settings feature is the group
//! case the deferral protocol exists for: a document-scoped fast path that
//! assigns globally where the backend allows, cooperating through the group
//! context with a variant-scoped fallback that completes the rest per
//! variant ([`param_settings_group`]).

pub mod add_params;
pub mod apply_settings;
pub mod set_values;

pub use add_params::{add_missing_params, AddMissingParams};
pub use apply_settings::{param_settings_group, ApplyParamSettings, ResolveDeferredValues};
pub use set_values::{set_variant_values, SetVariantValues, ValueSeries};
