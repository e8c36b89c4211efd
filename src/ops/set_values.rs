//! ops::set_values
//!
//! Standalone variant-scoped assignment through the coercion chain.
//!
//! Unlike the settings group, this operation takes ready-made values keyed
//! by variant (typically exported from another document or a measurement
//! source) and has no fast path: every assignment is per-variant.

use std::collections::BTreeMap;

use crate::coerce::{CoercionContext, StrategyHandle};
use crate::core::types::{ParamValue, ParameterName, Quantity, VariantName};
use crate::doc::{DocError, Document};
use crate::engine::group::SharedContext;
use crate::engine::log::{LogEntry, OperationLog};
use crate::engine::op::{Operation, Outcome, VariantOp, VariantPass};

/// One parameter's values by variant, with the quantity the source values
/// are measured in (`Plain` for unitless sources).
#[derive(Debug, Clone)]
pub struct ValueSeries {
    /// Target parameter.
    pub name: ParameterName,
    /// Quantity of the source values; measurables are in internal SI units.
    pub quantity: Quantity,
    /// Source value per variant. Variants absent here are left untouched.
    pub values: BTreeMap<VariantName, ParamValue>,
}

/// Assigns each series' value for the current variant, coerced to the
/// target parameter's storage.
pub struct SetVariantValues {
    series: Vec<ValueSeries>,
    strategy: StrategyHandle,
}

impl VariantOp for SetVariantValues {
    fn apply(
        &self,
        doc: &mut dyn Document,
        pass: &VariantPass,
        log: &mut OperationLog,
        _group: Option<&SharedContext>,
    ) -> Result<Outcome, DocError> {
        for series in &self.series {
            let Some(source) = series.values.get(&pass.variant) else {
                continue;
            };
            let mut entry =
                LogEntry::new(series.name.as_str()).with_variant(pass.variant.clone());

            let result = doc.parameter_info(&series.name).and_then(|info| {
                let request = CoercionContext::measurable(
                    source.clone(),
                    series.quantity,
                    info.storage,
                );
                let value = self
                    .strategy
                    .map(&request)
                    .map_err(|e| DocError::ValueRejected {
                        name: series.name.to_string(),
                        reason: e.to_string(),
                    })?;
                doc.set_value(&series.name, value.clone())?;
                Ok(value)
            });

            match result {
                Ok(value) => {
                    let _ = entry.succeed(format!("set to {value}"));
                }
                Err(e) => {
                    let _ = entry.fail(e.to_string());
                }
            }
            log.push(entry);
        }
        Ok(Outcome::Continue)
    }
}

/// Build the set-variant-values operation.
pub fn set_variant_values(series: Vec<ValueSeries>, strategy: StrategyHandle) -> Operation {
    Operation::variant(
        "set-variant-values",
        "assign per-variant values through the coercion chain",
        SetVariantValues { series, strategy },
    )
}
