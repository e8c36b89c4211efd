//! doc
//!
//! The document backend interface.
//!
//! This module is the **single doorway** to all document operations in
//! famforge. The host CAD application is an external collaborator; everything
//! the pipeline needs from it is expressed here as the [`Document`] and
//! [`DocumentHost`] traits, with errors normalized into typed failure
//! categories. No other module talks to a backend directly.
//!
//! # Architecture
//!
//! A [`Document`] is one open parametric family: it owns a set of named
//! variants ("types"), exactly one of which is *current* at any time, and a
//! set of parameters whose values live per variant. Parameter formulas are
//! document-global: assigning a formula affects every variant at once.
//! Mutations happen inside named transactions with commit/rollback.
//!
//! A [`DocumentHost`] is the surrounding session: it enumerates documents,
//! opens them for editing, and loads processed output files back in.
//!
//! # Error Handling
//!
//! Backend errors are categorized into typed variants so higher layers can
//! react distinctly. The one the engine cares most about is
//! [`DocError::FormulaRejected`]: the fast global-assignment path converts it
//! into a deferral instead of a failure (see `ops::apply_settings`).

pub mod memory;

use std::path::Path;

use thiserror::Error;

use crate::core::params::ParamSpec;
use crate::core::types::{ParamValue, ParameterName, Quantity, StorageKind, VariantName};

pub use memory::{JsonHost, MemoryDocument};

/// Errors from document backend operations.
#[derive(Debug, Error)]
pub enum DocError {
    /// Requested document does not exist in the host session.
    #[error("document not found: {name}")]
    DocumentNotFound {
        /// The document that was not found
        name: String,
    },

    /// Requested variant does not exist in the document.
    #[error("variant not found: {variant}")]
    VariantNotFound {
        /// The variant that was not found
        variant: String,
    },

    /// Requested parameter does not exist in the document.
    #[error("parameter not found: {name}")]
    ParameterNotFound {
        /// The parameter that was not found
        name: String,
    },

    /// Parameter already exists and cannot be added again.
    #[error("parameter already exists: {name}")]
    ParameterExists {
        /// The conflicting parameter
        name: String,
    },

    /// The backend refused a formula assignment.
    ///
    /// This is the fast-path failure the group deferral protocol is built
    /// around: it means "assign per variant instead", not "give up".
    #[error("formula rejected for {name}: {reason}")]
    FormulaRejected {
        /// Target parameter
        name: String,
        /// Backend's reason
        reason: String,
    },

    /// The backend refused a value assignment.
    #[error("value rejected for {name}: {reason}")]
    ValueRejected {
        /// Target parameter
        name: String,
        /// Backend's reason
        reason: String,
    },

    /// A value's storage kind does not match the parameter's.
    #[error("storage mismatch for {name}: parameter stores {expected}, value is {actual}")]
    StorageMismatch {
        /// Target parameter
        name: String,
        /// Parameter's storage kind
        expected: StorageKind,
        /// Value's storage kind
        actual: StorageKind,
    },

    /// Mutation attempted outside a transaction.
    #[error("no transaction is open")]
    NoTransaction,

    /// Transaction opened while another is active.
    #[error("a transaction is already open: {label}")]
    TransactionActive {
        /// Label of the open transaction
        label: String,
    },

    /// Document was closed and can no longer be used.
    #[error("document is closed: {name}")]
    Closed {
        /// The closed document
        name: String,
    },

    /// I/O failure while saving or loading.
    #[error("document i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure while saving or loading.
    #[error("document serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// A parameter as described by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    /// Parameter name.
    pub name: ParameterName,
    /// Storage kind.
    pub storage: StorageKind,
    /// Measurable quantity, `Quantity::Plain` if none.
    pub quantity: Quantity,
    /// Whether the parameter is instance-scoped in the host.
    pub instance: bool,
}

/// Options controlling how a processed document is written out.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    /// Replace an existing file at the target path.
    pub overwrite: bool,
    /// Write compact output (no pretty-printing).
    pub compact: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            compact: false,
        }
    }
}

/// One open parametric family document.
///
/// # Contract
///
/// - Exactly one variant is current at any time; [`Document::switch_variant`]
///   changes it. The switch is global, stateful document mutation.
/// - Value reads and writes apply to the **current** variant.
/// - Formula reads and writes apply to the **whole document**.
/// - All mutations must happen inside a transaction.
pub trait Document {
    /// Document (family) name.
    fn name(&self) -> &str;

    /// All variant names, in the backend's order.
    fn variants(&self) -> Vec<VariantName>;

    /// The currently active variant.
    fn current_variant(&self) -> VariantName;

    /// Make `variant` the active variant.
    fn switch_variant(&mut self, variant: &VariantName) -> Result<(), DocError>;

    /// All parameter names.
    fn parameters(&self) -> Vec<ParameterName>;

    /// Whether the document has a parameter with this name.
    fn has_parameter(&self, name: &ParameterName) -> bool;

    /// Describe a parameter.
    fn parameter_info(&self, name: &ParameterName) -> Result<ParameterInfo, DocError>;

    /// Add a new parameter.
    fn add_parameter(&mut self, spec: &ParamSpec) -> Result<(), DocError>;

    /// Remove a parameter and all its values.
    fn remove_parameter(&mut self, name: &ParameterName) -> Result<(), DocError>;

    /// Whether the parameter has a value on the current variant.
    fn has_value(&self, name: &ParameterName) -> Result<bool, DocError>;

    /// Whether the parameter is formula-driven.
    fn has_formula(&self, name: &ParameterName) -> Result<bool, DocError>;

    /// The parameter's value on the current variant.
    fn value(&self, name: &ParameterName) -> Result<Option<ParamValue>, DocError>;

    /// Assign a value on the current variant.
    fn set_value(&mut self, name: &ParameterName, value: ParamValue) -> Result<(), DocError>;

    /// The parameter's formula, if formula-driven.
    fn formula(&self, name: &ParameterName) -> Result<Option<String>, DocError>;

    /// Assign a formula, affecting every variant.
    fn set_formula(&mut self, name: &ParameterName, formula: &str) -> Result<(), DocError>;

    /// Remove the parameter's formula, keeping last computed values.
    fn clear_formula(&mut self, name: &ParameterName) -> Result<(), DocError>;

    /// Open a named transaction.
    fn begin_transaction(&mut self, label: &str) -> Result<(), DocError>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<(), DocError>;

    /// Roll back the open transaction, restoring pre-transaction state.
    fn rollback(&mut self) -> Result<(), DocError>;

    /// Write the document to `path`.
    fn save_as(&mut self, path: &Path, options: &SaveOptions) -> Result<(), DocError>;

    /// Close the document. Further use is an error.
    fn close(&mut self) -> Result<(), DocError>;
}

/// The host session holding documents.
pub trait DocumentHost {
    /// Names of all documents available in the session.
    fn document_names(&self) -> Vec<String>;

    /// Open a document for editing.
    fn open(&mut self, name: &str) -> Result<Box<dyn Document>, DocError>;

    /// Load a processed document file back into the session.
    fn load(&mut self, path: &Path) -> Result<(), DocError>;
}
