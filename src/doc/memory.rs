//! doc::memory
//!
//! In-memory document backend with JSON persistence.
//!
//! [`MemoryDocument`] implements the [`Document`] seam over plain serde-able
//! state, and [`JsonHost`] implements [`DocumentHost`] over a directory of
//! `.json` family files. Together they make the pipeline a working batch tool
//! and give tests a backend with real transactional behavior.
//!
//! # Formula semantics
//!
//! The backend does not evaluate expressions. A formula whose text is a
//! single numeric literal is applied to every variant immediately; any other
//! formula is stored as text after a syntactic check that every identifier it
//! references is a known parameter. Text-storage parameters reject formulas
//! outright - that rejection is what drives the engine's deferral protocol.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{DocError, Document, DocumentHost, ParameterInfo, SaveOptions};
use crate::core::params::ParamSpec;
use crate::core::types::{
    ParamValue, ParameterName, StorageKind, VariantName, FORMULA_BOUNDARY,
};

/// Per-parameter state: definition, optional formula, per-variant values.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParamState {
    spec: ParamSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    formula: Option<String>,
    #[serde(default)]
    values: BTreeMap<VariantName, ParamValue>,
}

/// Persistent document state, the unit of snapshot/rollback and of the
/// on-disk JSON format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocState {
    name: String,
    variants: Vec<VariantName>,
    current: VariantName,
    params: BTreeMap<ParameterName, ParamState>,
}

#[derive(Debug)]
struct OpenTransaction {
    label: String,
    snapshot: DocState,
}

/// An in-memory parametric family document.
#[derive(Debug)]
pub struct MemoryDocument {
    state: DocState,
    transaction: Option<OpenTransaction>,
    closed: bool,
}

impl MemoryDocument {
    /// Create a document with the given variants; the first is current.
    ///
    /// # Panics
    ///
    /// Panics if `variants` is empty. A family document always has at least
    /// one type.
    pub fn new(name: impl Into<String>, variants: Vec<VariantName>) -> Self {
        assert!(!variants.is_empty(), "a document needs at least one variant");
        let current = variants[0].clone();
        Self {
            state: DocState {
                name: name.into(),
                variants,
                current,
                params: BTreeMap::new(),
            },
            transaction: None,
            closed: false,
        }
    }

    /// Add a parameter at construction time (builder style, for fixtures).
    pub fn with_parameter(mut self, spec: ParamSpec) -> Self {
        let name = spec.name.clone();
        self.state.params.insert(
            name,
            ParamState {
                spec,
                formula: None,
                values: BTreeMap::new(),
            },
        );
        self
    }

    /// Set a value for one variant at construction time (builder style).
    ///
    /// # Panics
    ///
    /// Panics if the parameter was not added first; fixture bugs should fail
    /// loudly.
    pub fn with_value(mut self, name: &ParameterName, variant: &VariantName, value: ParamValue) -> Self {
        let param = self
            .state
            .params
            .get_mut(name)
            .unwrap_or_else(|| panic!("fixture parameter {name} missing"));
        param.values.insert(variant.clone(), value);
        self
    }

    /// Read a document from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, DocError> {
        let text = fs::read_to_string(path)?;
        let state: DocState = serde_json::from_str(&text)?;
        if state.variants.is_empty() {
            return Err(DocError::Backend(format!(
                "{}: document has no variants",
                path.display()
            )));
        }
        if !state.variants.contains(&state.current) {
            return Err(DocError::Backend(format!(
                "{}: current variant '{}' is not in the variant list",
                path.display(),
                state.current
            )));
        }
        Ok(Self {
            state,
            transaction: None,
            closed: false,
        })
    }

    fn check_open(&self) -> Result<(), DocError> {
        if self.closed {
            return Err(DocError::Closed {
                name: self.state.name.clone(),
            });
        }
        Ok(())
    }

    fn check_transaction(&self) -> Result<(), DocError> {
        if self.transaction.is_none() {
            return Err(DocError::NoTransaction);
        }
        Ok(())
    }

    fn param(&self, name: &ParameterName) -> Result<&ParamState, DocError> {
        self.state
            .params
            .get(name)
            .ok_or_else(|| DocError::ParameterNotFound {
                name: name.to_string(),
            })
    }

    fn param_mut(&mut self, name: &ParameterName) -> Result<&mut ParamState, DocError> {
        self.state
            .params
            .get_mut(name)
            .ok_or_else(|| DocError::ParameterNotFound {
                name: name.to_string(),
            })
    }

    /// Parse a formula consisting of a single numeric literal.
    fn constant_literal(formula: &str, storage: StorageKind) -> Option<ParamValue> {
        let text = formula.trim();
        match storage {
            StorageKind::Integer => text.parse::<i64>().ok().map(ParamValue::Integer),
            StorageKind::Double => text.parse::<f64>().ok().map(ParamValue::Double),
            StorageKind::Text => None,
        }
    }

    /// Syntactic check: every identifier token in `formula` must name a
    /// known parameter.
    fn check_references(&self, formula: &str) -> Result<(), String> {
        let is_boundary = |c: char| c.is_whitespace() || FORMULA_BOUNDARY.contains(&c);
        for token in formula.split(is_boundary) {
            if token.is_empty() {
                continue;
            }
            // Numeric literals are not references.
            if token.parse::<f64>().is_ok() {
                continue;
            }
            let known = self
                .state
                .params
                .keys()
                .any(|p| p.as_str() == token);
            if !known {
                return Err(format!("unknown reference '{token}'"));
            }
        }
        Ok(())
    }
}

impl Document for MemoryDocument {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn variants(&self) -> Vec<VariantName> {
        self.state.variants.clone()
    }

    fn current_variant(&self) -> VariantName {
        self.state.current.clone()
    }

    fn switch_variant(&mut self, variant: &VariantName) -> Result<(), DocError> {
        self.check_open()?;
        if !self.state.variants.contains(variant) {
            return Err(DocError::VariantNotFound {
                variant: variant.to_string(),
            });
        }
        self.state.current = variant.clone();
        Ok(())
    }

    fn parameters(&self) -> Vec<ParameterName> {
        self.state.params.keys().cloned().collect()
    }

    fn has_parameter(&self, name: &ParameterName) -> bool {
        self.state.params.contains_key(name)
    }

    fn parameter_info(&self, name: &ParameterName) -> Result<ParameterInfo, DocError> {
        self.check_open()?;
        let param = self.param(name)?;
        Ok(ParameterInfo {
            name: param.spec.name.clone(),
            storage: param.spec.storage,
            quantity: param.spec.quantity,
            instance: param.spec.instance,
        })
    }

    fn add_parameter(&mut self, spec: &ParamSpec) -> Result<(), DocError> {
        self.check_open()?;
        self.check_transaction()?;
        if self.state.params.contains_key(&spec.name) {
            return Err(DocError::ParameterExists {
                name: spec.name.to_string(),
            });
        }
        self.state.params.insert(
            spec.name.clone(),
            ParamState {
                spec: spec.clone(),
                formula: None,
                values: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn remove_parameter(&mut self, name: &ParameterName) -> Result<(), DocError> {
        self.check_open()?;
        self.check_transaction()?;
        if self.state.params.remove(name).is_none() {
            return Err(DocError::ParameterNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn has_value(&self, name: &ParameterName) -> Result<bool, DocError> {
        self.check_open()?;
        let param = self.param(name)?;
        Ok(param.values.contains_key(&self.state.current))
    }

    fn has_formula(&self, name: &ParameterName) -> Result<bool, DocError> {
        self.check_open()?;
        Ok(self.param(name)?.formula.is_some())
    }

    fn value(&self, name: &ParameterName) -> Result<Option<ParamValue>, DocError> {
        self.check_open()?;
        let param = self.param(name)?;
        Ok(param.values.get(&self.state.current).cloned())
    }

    fn set_value(&mut self, name: &ParameterName, value: ParamValue) -> Result<(), DocError> {
        self.check_open()?;
        self.check_transaction()?;
        let current = self.state.current.clone();
        let param = self.param_mut(name)?;
        if param.formula.is_some() {
            return Err(DocError::ValueRejected {
                name: name.to_string(),
                reason: "parameter is formula-driven".into(),
            });
        }
        let compatible = value.storage_kind() == param.spec.storage
            || (value.storage_kind() == StorageKind::Integer
                && param.spec.storage == StorageKind::Double);
        if !compatible {
            return Err(DocError::StorageMismatch {
                name: name.to_string(),
                expected: param.spec.storage,
                actual: value.storage_kind(),
            });
        }
        let stored = match (&value, param.spec.storage) {
            (ParamValue::Integer(i), StorageKind::Double) => ParamValue::Double(*i as f64),
            _ => value,
        };
        param.values.insert(current, stored);
        Ok(())
    }

    fn formula(&self, name: &ParameterName) -> Result<Option<String>, DocError> {
        self.check_open()?;
        Ok(self.param(name)?.formula.clone())
    }

    fn set_formula(&mut self, name: &ParameterName, formula: &str) -> Result<(), DocError> {
        self.check_open()?;
        self.check_transaction()?;
        let storage = self.param(name)?.spec.storage;
        if storage == StorageKind::Text {
            return Err(DocError::FormulaRejected {
                name: name.to_string(),
                reason: "text parameters cannot be formula-driven".into(),
            });
        }
        if let Some(constant) = Self::constant_literal(formula, storage) {
            // A constant formula is applied to every variant immediately.
            let variants = self.state.variants.clone();
            let param = self.param_mut(name)?;
            param.formula = Some(formula.to_string());
            for variant in variants {
                param.values.insert(variant, constant.clone());
            }
            return Ok(());
        }
        self.check_references(formula)
            .map_err(|reason| DocError::FormulaRejected {
                name: name.to_string(),
                reason,
            })?;
        self.param_mut(name)?.formula = Some(formula.to_string());
        Ok(())
    }

    fn clear_formula(&mut self, name: &ParameterName) -> Result<(), DocError> {
        self.check_open()?;
        self.check_transaction()?;
        self.param_mut(name)?.formula = None;
        Ok(())
    }

    fn begin_transaction(&mut self, label: &str) -> Result<(), DocError> {
        self.check_open()?;
        if let Some(txn) = &self.transaction {
            return Err(DocError::TransactionActive {
                label: txn.label.clone(),
            });
        }
        self.transaction = Some(OpenTransaction {
            label: label.to_string(),
            snapshot: self.state.clone(),
        });
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DocError> {
        self.check_open()?;
        self.transaction.take().ok_or(DocError::NoTransaction)?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DocError> {
        self.check_open()?;
        let txn = self.transaction.take().ok_or(DocError::NoTransaction)?;
        self.state = txn.snapshot;
        Ok(())
    }

    fn save_as(&mut self, path: &Path, options: &SaveOptions) -> Result<(), DocError> {
        self.check_open()?;
        if !options.overwrite && path.exists() {
            return Err(DocError::Backend(format!(
                "refusing to overwrite {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = if options.compact {
            serde_json::to_string(&self.state)?
        } else {
            serde_json::to_string_pretty(&self.state)?
        };
        fs::write(path, text)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DocError> {
        self.check_open()?;
        // Closing with an open transaction discards it.
        self.transaction = None;
        self.closed = true;
        Ok(())
    }
}

/// A document host over a directory of `.json` family files.
#[derive(Debug)]
pub struct JsonHost {
    dir: PathBuf,
    loaded: Vec<PathBuf>,
}

impl JsonHost {
    /// Create a host over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: Vec::new(),
        }
    }

    /// Paths loaded back into the session via [`DocumentHost::load`].
    pub fn loaded(&self) -> &[PathBuf] {
        &self.loaded
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl DocumentHost for JsonHost {
    fn document_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "json") {
                    path.file_stem().map(|s| s.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn Document>, DocError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(DocError::DocumentNotFound {
                name: name.to_string(),
            });
        }
        Ok(Box::new(MemoryDocument::from_file(&path)?))
    }

    fn load(&mut self, path: &Path) -> Result<(), DocError> {
        // Validate the file parses before recording it as loaded.
        MemoryDocument::from_file(path)?;
        self.loaded.push(path.to_path_buf());
        Ok(())
    }
}
