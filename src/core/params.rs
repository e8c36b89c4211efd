//! core::params
//!
//! Parameter definition and assignment models.
//!
//! # Types
//!
//! - [`ParamSpec`] - A parameter definition, used to add missing parameters
//! - [`ParamSettingModel`] - A requested assignment: a value or formula for
//!   one parameter, optionally overridden per variant
//!
//! A [`ParamSettingModel`] whose formula references other setting names forms
//! the dependency edges consumed by [`crate::core::deps::sort`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{ParameterName, Quantity, StorageKind, VariantName};

/// A parameter definition.
///
/// Used by add-parameter operations to create parameters the document does
/// not yet have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: ParameterName,
    /// Storage kind for the new parameter.
    pub storage: StorageKind,
    /// Measurable quantity, if any.
    #[serde(default = "ParamSpec::default_quantity")]
    pub quantity: Quantity,
    /// Whether the parameter varies per instance rather than per variant.
    /// Instance parameters still hold one value per variant in the document
    /// model; the flag is carried through to the backend.
    #[serde(default)]
    pub instance: bool,
}

impl ParamSpec {
    fn default_quantity() -> Quantity {
        Quantity::Plain
    }

    /// Create a plain (non-measurable) parameter spec.
    pub fn plain(name: ParameterName, storage: StorageKind) -> Self {
        Self {
            name,
            storage,
            quantity: Quantity::Plain,
            instance: false,
        }
    }

    /// Create a measurable parameter spec (double storage).
    pub fn measurable(name: ParameterName, quantity: Quantity) -> Self {
        Self {
            name,
            storage: StorageKind::Double,
            quantity,
            instance: false,
        }
    }
}

/// A requested parameter assignment.
///
/// Exactly one of the interpretations applies:
/// - `set_as_formula == true`: `value_or_formula` is a formula, assigned once
///   for the whole document (formulas apply to every variant).
/// - `set_as_formula == false` and `values_per_variant` is empty:
///   `value_or_formula` is a literal to assign to every variant.
/// - `values_per_variant` non-empty: per-variant literals; variants without an
///   override fall back to `value_or_formula` when it is non-empty.
///
/// # Example
///
/// ```
/// use famforge::core::params::ParamSettingModel;
/// use famforge::core::types::ParameterName;
///
/// let model = ParamSettingModel::value(
///     ParameterName::new("Depth").unwrap(),
///     "Width / 2",
/// ).as_formula();
/// assert!(model.set_as_formula);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSettingModel {
    /// Target parameter name.
    pub name: ParameterName,
    /// Literal value or formula text, depending on `set_as_formula`.
    pub value_or_formula: String,
    /// Assign `value_or_formula` as a formula instead of a literal.
    #[serde(default)]
    pub set_as_formula: bool,
    /// Per-variant literal overrides.
    #[serde(default)]
    pub values_per_variant: BTreeMap<VariantName, String>,
}

impl ParamSettingModel {
    /// Create a literal-value assignment.
    pub fn value(name: ParameterName, value: impl Into<String>) -> Self {
        Self {
            name,
            value_or_formula: value.into(),
            set_as_formula: false,
            values_per_variant: BTreeMap::new(),
        }
    }

    /// Mark the assignment as a formula (builder style).
    pub fn as_formula(mut self) -> Self {
        self.set_as_formula = true;
        self
    }

    /// Add a per-variant override (builder style).
    pub fn with_variant_value(
        mut self,
        variant: VariantName,
        value: impl Into<String>,
    ) -> Self {
        self.values_per_variant.insert(variant, value.into());
        self
    }

    /// The formula text to use for dependency extraction, if any.
    ///
    /// Only formula assignments create dependency edges; literal values are
    /// opaque to the sorter.
    pub fn formula(&self) -> Option<&str> {
        if self.set_as_formula {
            Some(&self.value_or_formula)
        } else {
            None
        }
    }

    /// The literal to assign for a given variant, honoring overrides.
    ///
    /// Returns `None` for formula assignments and for variants with neither
    /// an override nor a global literal.
    pub fn literal_for(&self, variant: &VariantName) -> Option<&str> {
        if self.set_as_formula {
            return None;
        }
        if let Some(v) = self.values_per_variant.get(variant) {
            return Some(v);
        }
        if self.value_or_formula.is_empty() {
            None
        } else {
            Some(&self.value_or_formula)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ParameterName {
        ParameterName::new(s).unwrap()
    }

    fn variant(s: &str) -> VariantName {
        VariantName::new(s).unwrap()
    }

    mod param_spec {
        use super::*;

        #[test]
        fn measurable_uses_double_storage() {
            let spec = ParamSpec::measurable(name("Weight"), Quantity::Mass);
            assert_eq!(spec.storage, StorageKind::Double);
            assert!(spec.quantity.is_measurable());
        }

        #[test]
        fn toml_defaults() {
            let spec: ParamSpec = toml::from_str(
                r#"
                name = "Count"
                storage = "integer"
                "#,
            )
            .unwrap();
            assert_eq!(spec.quantity, Quantity::Plain);
            assert!(!spec.instance);
        }
    }

    mod param_setting_model {
        use super::*;

        #[test]
        fn formula_only_for_formula_assignments() {
            let literal = ParamSettingModel::value(name("A"), "10");
            assert_eq!(literal.formula(), None);

            let formula = ParamSettingModel::value(name("A"), "B + 1").as_formula();
            assert_eq!(formula.formula(), Some("B + 1"));
        }

        #[test]
        fn literal_for_prefers_override() {
            let model = ParamSettingModel::value(name("A"), "10")
                .with_variant_value(variant("Large"), "20");
            assert_eq!(model.literal_for(&variant("Large")), Some("20"));
            assert_eq!(model.literal_for(&variant("Small")), Some("10"));
        }

        #[test]
        fn literal_for_none_without_global_or_override() {
            let mut model = ParamSettingModel::value(name("A"), "");
            model
                .values_per_variant
                .insert(variant("Large"), "20".into());
            assert_eq!(model.literal_for(&variant("Large")), Some("20"));
            assert_eq!(model.literal_for(&variant("Small")), None);
        }

        #[test]
        fn literal_for_none_for_formula() {
            let model = ParamSettingModel::value(name("A"), "B * 2").as_formula();
            assert_eq!(model.literal_for(&variant("Any")), None);
        }
    }
}
