//! core::config
//!
//! Declarative run configuration.
//!
//! A TOML file describes one batch run: which documents to process, which
//! parameters to ensure exist, and which assignments to request. Loading is
//! strict (`deny_unknown_fields` plus an explicit [`RunConfig::validate`]);
//! a config that parses is still rejected if it asks for contradictory
//! things. [`RunConfig::build_queue`] turns the validated config into an
//! operation queue, surfacing dependency cycles and unknown strategy names
//! before any document is opened.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::coerce::{CoerceError, CoercionRegistry};
use crate::core::deps::DepError;
use crate::core::params::{ParamSettingModel, ParamSpec};
use crate::core::types::{ParameterName, VariantName};
use crate::doc::SaveOptions;
use crate::engine::queue::{CompileOptions, OperationQueue};
use crate::engine::ProcessOptions;
use crate::ops::{add_missing_params, param_settings_group};

/// Errors loading or applying a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for the schema.
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// File parsed but asks for something contradictory.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// Requested assignments form a dependency cycle or duplicate a target.
    #[error(transparent)]
    Dependencies(#[from] DepError),

    /// Requested coercion strategy is not registered.
    #[error(transparent)]
    Strategy(#[from] CoerceError),
}

/// The `[run]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunSection {
    /// Documents to process; empty means every document in the session.
    pub documents: Vec<String>,
    /// Directory for processed output; `None` skips save/load.
    pub output_dir: Option<PathBuf>,
    /// Batch consecutive variant-scoped operations.
    pub merge_variant_ops: bool,
    /// One backend transaction around the whole queue.
    pub single_transaction: bool,
    /// Replace existing output files.
    pub overwrite: bool,
    /// Write compact output.
    pub compact: bool,
    /// Coercion strategy name for per-variant assignment.
    pub strategy: String,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            output_dir: None,
            merge_variant_ops: true,
            single_transaction: false,
            overwrite: true,
            compact: false,
            strategy: "composite".into(),
        }
    }
}

/// One `[[settings]]` entry: a requested parameter assignment.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingEntry {
    /// Target parameter.
    pub name: ParameterName,
    /// Literal to assign (global, unless overridden per variant).
    #[serde(default)]
    pub value: String,
    /// Formula to assign instead of a literal.
    #[serde(default)]
    pub formula: Option<String>,
    /// Per-variant literal overrides.
    #[serde(default)]
    pub variants: BTreeMap<VariantName, String>,
}

impl SettingEntry {
    fn into_model(self) -> ParamSettingModel {
        match self.formula {
            Some(formula) => ParamSettingModel::value(self.name, formula).as_formula(),
            None => {
                let mut model = ParamSettingModel::value(self.name, self.value);
                model.values_per_variant = self.variants;
                model
            }
        }
    }
}

/// A full batch run description.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Run-wide settings.
    #[serde(default)]
    pub run: RunSection,
    /// Parameters to create when missing.
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
    /// Assignments to request.
    #[serde(default)]
    pub settings: Vec<SettingEntry>,
}

impl RunConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    /// Parse and validate config text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject contradictory or duplicate requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: Vec<&str> = Vec::new();
        for spec in &self.parameters {
            if seen.contains(&spec.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "parameter '{}' declared twice",
                    spec.name
                )));
            }
            seen.push(spec.name.as_str());
        }
        for entry in &self.settings {
            if let Some(formula) = &entry.formula {
                if !entry.value.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "setting '{}' has both a value and a formula",
                        entry.name
                    )));
                }
                if !entry.variants.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "setting '{}' has both a formula and per-variant values",
                        entry.name
                    )));
                }
                if formula.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "setting '{}' has an empty formula",
                        entry.name
                    )));
                }
            } else if entry.value.is_empty() && entry.variants.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "setting '{}' assigns nothing",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    /// Build the operation queue this config describes.
    ///
    /// Dependency cycles among the requested formulas and unknown strategy
    /// names fail here, before any document is opened.
    pub fn build_queue(self, registry: &CoercionRegistry) -> Result<OperationQueue, ConfigError> {
        let mut queue = OperationQueue::new();
        if !self.parameters.is_empty() {
            queue.add(add_missing_params(self.parameters));
        }
        if !self.settings.is_empty() {
            let strategy = registry.get(&self.run.strategy)?;
            let models = self.settings.into_iter().map(SettingEntry::into_model).collect();
            queue.add_group(param_settings_group(models, strategy)?);
        }
        Ok(queue)
    }

    /// The processing options this config describes. Debug/quiet flags come
    /// from the command line, not the file; the caller sets them afterwards.
    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            compile: CompileOptions {
                merge_variant_ops: self.run.merge_variant_ops,
                single_transaction: self.run.single_transaction,
            },
            run: Default::default(),
            output_dir: self.run.output_dir.clone(),
            save: SaveOptions {
                overwrite: self.run.overwrite,
                compact: self.run.compact,
            },
        }
    }
}
