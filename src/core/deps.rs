//! core::deps
//!
//! Dependency-ordered sorting of parameter assignments.
//!
//! # Architecture
//!
//! Formula assignments may reference other parameters by name. The backend
//! rejects a formula whose operands have not been assigned yet, so requests
//! must be applied in dependency order: if A's formula references B, B is
//! assigned first.
//!
//! References are extracted syntactically: B's name must appear in A's
//! formula as a whole token. Token boundaries are operators, whitespace,
//! brackets, and comma; a name occurring inside a longer identifier does not
//! count. No semantic validation of formulas is attempted.
//!
//! # Invariants
//!
//! - Requests without formulas keep their original relative order
//! - The sort is stable with respect to input order among ready requests
//! - A dependency cycle is a fatal configuration error naming every
//!   unresolved request; nothing is partially applied

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use super::params::ParamSettingModel;
use super::types::FORMULA_BOUNDARY;

/// Errors from dependency sorting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DepError {
    /// Two assignment requests target the same parameter.
    #[error("duplicate assignment for parameter '{0}'")]
    Duplicate(String),

    /// Self-referential or mutually dependent formulas.
    ///
    /// The backend cannot resolve these in any order; the caller's
    /// configuration must be fixed.
    #[error("dependency cycle among parameters: {}", .names.join(", "))]
    Cycle {
        /// Every request left unresolved when the sort stalled.
        names: Vec<String>,
    },
}

/// Check whether `name` occurs in `formula` as a whole token.
///
/// # Example
///
/// ```
/// use famforge::core::deps::references;
///
/// assert!(references("Width + 2", "Width"));
/// assert!(references("(Depth)*3", "Depth"));
/// // Substring inside a longer identifier does not count.
/// assert!(!references("Widths + 2", "Width"));
/// assert!(!references("My_Width", "Width"));
/// ```
pub fn references(formula: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let is_boundary = |c: char| c.is_whitespace() || FORMULA_BOUNDARY.contains(&c);
    let mut search = formula;
    let mut offset = 0usize;
    while let Some(pos) = search.find(name) {
        let start = offset + pos;
        let end = start + name.len();
        let before_ok = formula[..start]
            .chars()
            .next_back()
            .is_none_or(&is_boundary);
        let after_ok = formula[end..].chars().next().is_none_or(&is_boundary);
        if before_ok && after_ok {
            return true;
        }
        // Advance past this occurrence and keep scanning.
        let next = pos + name.len();
        search = &search[next..];
        offset += next;
    }
    false
}

/// Sort assignment requests into dependency order.
///
/// Runs Kahn's algorithm over the reference graph: requests whose formulas
/// reference no other request are assignable first; processing a request
/// unblocks its dependents.
///
/// # Errors
///
/// - [`DepError::Duplicate`] if two requests target the same parameter
/// - [`DepError::Cycle`] if any requests remain after the queue drains,
///   naming every unresolved request
///
/// # Example
///
/// ```
/// use famforge::core::deps::sort;
/// use famforge::core::params::ParamSettingModel;
/// use famforge::core::types::ParameterName;
///
/// let a = ParamSettingModel::value(ParameterName::new("A").unwrap(), "B + 1").as_formula();
/// let b = ParamSettingModel::value(ParameterName::new("B").unwrap(), "5");
/// let models = [a, b];
/// let sorted = sort(&models).unwrap();
/// assert_eq!(sorted[0].name.as_str(), "B");
/// assert_eq!(sorted[1].name.as_str(), "A");
/// ```
pub fn sort(models: &[ParamSettingModel]) -> Result<Vec<&ParamSettingModel>, DepError> {
    // Index requests by name for edge lookup.
    let mut by_name: HashMap<&str, usize> = HashMap::with_capacity(models.len());
    for (i, model) in models.iter().enumerate() {
        if by_name.insert(model.name.as_str(), i).is_some() {
            return Err(DepError::Duplicate(model.name.to_string()));
        }
    }

    // dependents[b] lists requests whose formula references b.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); models.len()];
    let mut in_degree: Vec<usize> = vec![0; models.len()];

    for (i, model) in models.iter().enumerate() {
        let Some(formula) = model.formula() else {
            continue;
        };
        for (name, &j) in &by_name {
            if references(formula, name) {
                dependents[j].push(i);
                in_degree[i] += 1;
            }
        }
    }
    // Deterministic unblock order regardless of HashMap iteration.
    for deps in &mut dependents {
        deps.sort_unstable();
    }

    let mut queue: VecDeque<usize> = (0..models.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(models.len());

    while let Some(i) = queue.pop_front() {
        order.push(&models[i]);
        for &dep in &dependents[i] {
            in_degree[dep] -= 1;
            if in_degree[dep] == 0 {
                queue.push_back(dep);
            }
        }
    }

    if order.len() != models.len() {
        let names = (0..models.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| models[i].name.to_string())
            .collect();
        return Err(DepError::Cycle { names });
    }

    Ok(order)
}
