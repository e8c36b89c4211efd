//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ParameterName`] - Validated parameter name (safe to reference from formulas)
//! - [`VariantName`] - Validated variant ("family type") name
//! - [`StorageKind`] - How a parameter value is stored by the backend
//! - [`Quantity`] - What a measurable parameter value measures
//! - [`DisplayUnit`] - Unit a measurable value is expressed in
//! - [`ParamValue`] - A heterogeneous parameter value
//!
//! # Validation
//!
//! Name types enforce validity at construction time. Invalid values cannot be
//! represented, preventing entire classes of bugs: in particular, a
//! [`ParameterName`] can never contain a formula boundary character, so
//! whole-token reference extraction in [`crate::core::deps`] is unambiguous.
//!
//! # Examples
//!
//! ```
//! use famforge::core::types::{ParameterName, VariantName};
//!
//! // Valid constructions
//! let name = ParameterName::new("Shelf_Depth").unwrap();
//! assert_eq!(name.as_str(), "Shelf_Depth");
//!
//! // Invalid constructions fail at creation time
//! assert!(ParameterName::new("a+b").is_err());
//! assert!(ParameterName::new("has space").is_err());
//! assert!(VariantName::new("").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid parameter name: {0}")]
    InvalidParameterName(String),

    #[error("invalid variant name: {0}")]
    InvalidVariantName(String),
}

/// Characters that terminate an identifier token inside a formula.
///
/// Parameter names must not contain any of these; formulas use them as
/// operators, grouping, and separators.
pub const FORMULA_BOUNDARY: &[char] = &[
    '+', '-', '*', '/', '^', '<', '>', '=', '(', ')', '[', ']', '{', '}', ',',
];

/// A validated parameter name.
///
/// Parameter names:
/// - Cannot be empty
/// - Cannot contain whitespace or ASCII control characters
/// - Cannot contain formula boundary characters (`+ - * / ^ < > = ( ) [ ] { } ,`)
/// - Cannot start with a digit
///
/// # Example
///
/// ```
/// use famforge::core::types::ParameterName;
///
/// let name = ParameterName::new("Voltage").unwrap();
/// assert_eq!(name.as_str(), "Voltage");
///
/// assert!(ParameterName::new("").is_err());
/// assert!(ParameterName::new("2nd_Width").is_err());
/// assert!(ParameterName::new("a,b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterName(String);

impl ParameterName {
    /// Create a new validated parameter name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidParameterName` if the name violates the rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidParameterName(
                "parameter name cannot be empty".into(),
            ));
        }
        if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Err(TypeError::InvalidParameterName(format!(
                "parameter name cannot start with a digit: {name:?}"
            )));
        }
        for c in name.chars() {
            if c.is_whitespace() || c.is_control() {
                return Err(TypeError::InvalidParameterName(format!(
                    "parameter name cannot contain whitespace or control characters: {name:?}"
                )));
            }
            if FORMULA_BOUNDARY.contains(&c) {
                return Err(TypeError::InvalidParameterName(format!(
                    "parameter name cannot contain formula character {c:?}: {name:?}"
                )));
            }
        }
        Ok(())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ParameterName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParameterName> for String {
    fn from(value: ParameterName) -> Self {
        value.0
    }
}

/// A validated variant ("family type") name.
///
/// Variant names cannot be empty and cannot contain ASCII control characters.
/// Unlike parameter names they may contain spaces: `24" x 36"` styles are
/// common in real documents.
///
/// # Example
///
/// ```
/// use famforge::core::types::VariantName;
///
/// let v = VariantName::new("600mm Wide").unwrap();
/// assert_eq!(v.as_str(), "600mm Wide");
/// assert!(VariantName::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantName(String);

impl VariantName {
    /// Create a new validated variant name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVariantName` if the name is empty or
    /// contains control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidVariantName(
                "variant name cannot be empty".into(),
            ));
        }
        if name.chars().any(|c| c.is_control()) {
            return Err(TypeError::InvalidVariantName(format!(
                "variant name cannot contain control characters: {name:?}"
            )));
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VariantName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariantName> for String {
    fn from(value: VariantName) -> Self {
        value.0
    }
}

/// How the backend stores a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Whole-number storage.
    Integer,
    /// Floating-point storage. Measurable quantities are stored this way,
    /// in the backend's internal (SI) units.
    Double,
    /// Free-text storage.
    Text,
}

impl StorageKind {
    /// Check if this kind stores a numeric value.
    pub fn is_numeric(&self) -> bool {
        matches!(self, StorageKind::Integer | StorageKind::Double)
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageKind::Integer => "integer",
            StorageKind::Double => "double",
            StorageKind::Text => "text",
        };
        f.write_str(s)
    }
}

/// What a measurable parameter value measures.
///
/// `Plain` marks non-measurable values (counts, labels). Measurable variants
/// are stored in internal SI units by the backend ([`StorageKind::Double`]):
/// kilograms for mass, meters for length, volts for electrical potential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// Not a measurable quantity.
    Plain,
    /// Mass, internal unit kilograms.
    Mass,
    /// Length, internal unit meters.
    Length,
    /// Electrical potential, internal unit volts.
    ElectricalPotential,
}

impl Quantity {
    /// Check if this is a measurable quantity (has internal units).
    pub fn is_measurable(&self) -> bool {
        !matches!(self, Quantity::Plain)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quantity::Plain => "plain",
            Quantity::Mass => "mass",
            Quantity::Length => "length",
            Quantity::ElectricalPotential => "electrical potential",
        };
        f.write_str(s)
    }
}

/// Unit a measurable value is expressed in for display or plain-number export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayUnit {
    Kilograms,
    Pounds,
    Meters,
    Feet,
    Volts,
}

impl fmt::Display for DisplayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DisplayUnit::Kilograms => "kg",
            DisplayUnit::Pounds => "lb",
            DisplayUnit::Meters => "m",
            DisplayUnit::Feet => "ft",
            DisplayUnit::Volts => "V",
        };
        f.write_str(s)
    }
}

/// A heterogeneous parameter value.
///
/// # Example
///
/// ```
/// use famforge::core::types::ParamValue;
///
/// let v = ParamValue::Double(2.5);
/// assert_eq!(v.as_f64(), Some(2.5));
/// assert_eq!(v.to_string(), "2.5");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Double(f64),
    Text(String),
}

impl ParamValue {
    /// The storage kind this value naturally occupies.
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            ParamValue::Integer(_) => StorageKind::Integer,
            ParamValue::Double(_) => StorageKind::Double,
            ParamValue::Text(_) => StorageKind::Text,
        }
    }

    /// Numeric view of the value, if it has one.
    ///
    /// Text is not parsed here; parsing free-text is a coercion-strategy
    /// concern, not a property of the value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Integer(i) => Some(*i as f64),
            ParamValue::Double(d) => Some(*d),
            ParamValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Double(d) => write!(f, "{d}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parameter_name {
        use super::*;

        #[test]
        fn valid_names() {
            for name in ["Width", "Shelf_Depth", "Voltage2", "wattage.nominal"] {
                assert!(ParameterName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn rejects_empty() {
            assert!(ParameterName::new("").is_err());
        }

        #[test]
        fn rejects_leading_digit() {
            assert!(ParameterName::new("2x4").is_err());
        }

        #[test]
        fn rejects_boundary_characters() {
            for name in ["a+b", "a-b", "f(x)", "a,b", "a=b", "x[0]"] {
                assert!(ParameterName::new(name).is_err(), "{name} should be invalid");
            }
        }

        #[test]
        fn rejects_whitespace() {
            assert!(ParameterName::new("has space").is_err());
            assert!(ParameterName::new("tab\tname").is_err());
        }

        #[test]
        fn serde_string_form() {
            let name = ParameterName::new("Depth").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            assert_eq!(json, "\"Depth\"");
            let back: ParameterName = serde_json::from_str(&json).unwrap();
            assert_eq!(back, name);
        }

        #[test]
        fn serde_rejects_invalid() {
            assert!(serde_json::from_str::<ParameterName>("\"a+b\"").is_err());
        }
    }

    mod variant_name {
        use super::*;

        #[test]
        fn allows_spaces_and_punctuation() {
            assert!(VariantName::new("600mm Wide").is_ok());
            assert!(VariantName::new("24\" x 36\"").is_ok());
        }

        #[test]
        fn rejects_empty_and_control() {
            assert!(VariantName::new("").is_err());
            assert!(VariantName::new("bad\nname").is_err());
        }
    }

    mod storage_kind {
        use super::*;

        #[test]
        fn numeric_kinds() {
            assert!(StorageKind::Integer.is_numeric());
            assert!(StorageKind::Double.is_numeric());
            assert!(!StorageKind::Text.is_numeric());
        }
    }

    mod param_value {
        use super::*;

        #[test]
        fn storage_kind_matches_variant() {
            assert_eq!(ParamValue::Integer(3).storage_kind(), StorageKind::Integer);
            assert_eq!(ParamValue::Double(1.5).storage_kind(), StorageKind::Double);
            assert_eq!(
                ParamValue::Text("x".into()).storage_kind(),
                StorageKind::Text
            );
        }

        #[test]
        fn as_f64_does_not_parse_text() {
            assert_eq!(ParamValue::Text("1.5".into()).as_f64(), None);
            assert_eq!(ParamValue::Integer(2).as_f64(), Some(2.0));
        }

        #[test]
        fn display() {
            assert_eq!(ParamValue::Integer(7).to_string(), "7");
            assert_eq!(ParamValue::Text("208V".into()).to_string(), "208V");
        }
    }
}
