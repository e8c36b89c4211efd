//! ops::apply_settings
//!
//! The parameter-settings group: global fast path plus per-variant fallback.
//!
//! # Architecture
//!
//! Assignment requests ([`ParamSettingModel`]) are dependency-sorted once at
//! group build time; a cycle is a fatal configuration error surfaced before
//! any document is touched. The group then runs two cooperating operations
//! against each document:
//!
//! 1. [`ApplyParamSettings`] (document-scoped): for each request in
//!    dependency order, attempt one global assignment - the formula itself,
//!    or the global literal through the backend's constant-formula path.
//!    A [`crate::doc::DocError::FormulaRejected`] answer defers the request:
//!    its context entry stays `Pending` with a note, and nothing fails.
//! 2. [`ResolveDeferredValues`] (variant-scoped): on every variant, assigns
//!    a literal for each request still incomplete, coercing it through the
//!    configured strategy. On the final variant of the sweep it terminates
//!    every remaining entry and exports the context into its log.
//!
//! # Invariants
//!
//! - Per-request results live in the group context until the final variant
//!   pass; only the fallback's log carries the exported entries
//! - A request failing on one variant is terminal immediately; later
//!   variants skip it
//! - The two operations are inseparable by construction: only
//!   [`param_settings_group`] builds them, always adjacent in one group

use std::sync::Arc;

use crate::coerce::{CoercionContext, StrategyHandle};
use crate::core::deps::{self, DepError};
use crate::core::params::ParamSettingModel;
use crate::core::types::ParamValue;
use crate::doc::{DocError, Document};
use crate::engine::group::{OperationGroup, SharedContext};
use crate::engine::log::OperationLog;
use crate::engine::op::{DocOp, Operation, Outcome, VariantOp, VariantPass};

/// Message prefix marking a completed per-variant assignment; the final
/// pass uses it to tell "assigned" entries from "never had a value" ones.
const ASSIGNED: &str = "set ";

/// Parse a request literal into the value shape it reads as.
fn parse_literal(literal: &str) -> ParamValue {
    let text = literal.trim();
    if let Ok(i) = text.parse::<i64>() {
        return ParamValue::Integer(i);
    }
    if let Ok(d) = text.parse::<f64>() {
        return ParamValue::Double(d);
    }
    ParamValue::Text(literal.to_string())
}

/// Document-scoped fast path: one global assignment attempt per request.
pub struct ApplyParamSettings {
    models: Arc<Vec<ParamSettingModel>>,
}

impl DocOp for ApplyParamSettings {
    fn apply(
        &self,
        doc: &mut dyn Document,
        _log: &mut OperationLog,
        group: Option<&SharedContext>,
    ) -> Result<(), DocError> {
        let ctx = group.ok_or_else(|| {
            DocError::Backend("parameter settings require a group context".into())
        })?;

        {
            let mut guard = ctx.borrow_mut();
            for model in self.models.iter() {
                guard.init(model.name.as_str());
            }
        }

        for model in self.models.iter() {
            let mut guard = ctx.borrow_mut();
            let Some(entry) = guard.entry_mut(model.name.as_str()) else {
                continue;
            };
            if entry.is_terminal() {
                continue;
            }

            if !doc.has_parameter(&model.name) {
                let _ = entry.fail("parameter not found in document");
                continue;
            }

            if let Some(formula) = model.formula() {
                match doc.set_formula(&model.name, formula) {
                    Ok(()) => {
                        let _ = entry.succeed(format!("formula '{formula}' assigned"));
                    }
                    Err(DocError::FormulaRejected { reason, .. }) => {
                        entry.defer(format!("global formula rejected: {reason}"));
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }

            if model.values_per_variant.is_empty() && !model.value_or_formula.is_empty() {
                // Global literal: the backend's constant-formula path fills
                // every variant in one call.
                match doc.set_formula(&model.name, &model.value_or_formula) {
                    Ok(()) => {
                        let _ = entry
                            .succeed(format!("{ASSIGNED}{} globally", model.value_or_formula));
                    }
                    Err(DocError::FormulaRejected { reason, .. }) => {
                        entry.defer(format!("global assignment rejected: {reason}"));
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }

            entry.defer("per-variant values requested");
        }

        Ok(())
    }
}

/// Variant-scoped fallback: completes every request the fast path deferred.
pub struct ResolveDeferredValues {
    models: Arc<Vec<ParamSettingModel>>,
    strategy: StrategyHandle,
}

impl ResolveDeferredValues {
    fn assign(
        &self,
        doc: &mut dyn Document,
        model: &ParamSettingModel,
        literal: &str,
    ) -> Result<String, String> {
        let info = doc.parameter_info(&model.name).map_err(|e| e.to_string())?;
        let request = CoercionContext::plain(parse_literal(literal), info.storage);
        let value = self.strategy.map(&request).map_err(|e| e.to_string())?;
        doc.set_value(&model.name, value.clone())
            .map_err(|e| e.to_string())?;
        Ok(format!("{ASSIGNED}{} = {value}", model.name))
    }
}

impl VariantOp for ResolveDeferredValues {
    fn apply(
        &self,
        doc: &mut dyn Document,
        pass: &VariantPass,
        log: &mut OperationLog,
        group: Option<&SharedContext>,
    ) -> Result<Outcome, DocError> {
        let ctx = group.ok_or_else(|| {
            DocError::Backend("parameter settings require a group context".into())
        })?;

        let incomplete = ctx.borrow().incomplete_names();
        for name in incomplete {
            let Some(model) = self.models.iter().find(|m| m.name.as_str() == name) else {
                let mut guard = ctx.borrow_mut();
                if let Some(entry) = guard.entry_mut(&name) {
                    let _ = entry.fail("no matching assignment request");
                }
                continue;
            };

            let outcome = model
                .literal_for(&pass.variant)
                .map(|literal| self.assign(doc, model, literal));

            let mut guard = ctx.borrow_mut();
            let Some(entry) = guard.entry_mut(&name) else {
                continue;
            };
            match outcome {
                None => entry.defer(format!("no value for variant '{}'", pass.variant)),
                Some(Ok(detail)) => {
                    entry.defer(format!("variant '{}': {detail}", pass.variant));
                }
                Some(Err(message)) => {
                    let _ = entry.fail(format!("variant '{}': {message}", pass.variant));
                }
            }
        }

        if pass.is_last() {
            let mut guard = ctx.borrow_mut();
            for entry in guard.incomplete_mut() {
                if entry.messages.iter().any(|m| m.contains(ASSIGNED)) {
                    let _ = entry.succeed("assigned per variant");
                } else {
                    let _ = entry.skip("no values for any variant");
                }
            }
            for entry in guard.snapshot_and_clear() {
                log.push(entry);
            }
        }

        Ok(Outcome::Continue)
    }
}

/// Build the parameter-settings group.
///
/// Sorts the requests into dependency order; a duplicate target or a
/// dependency cycle is a configuration error and fails here, before any
/// document is opened.
pub fn param_settings_group(
    models: Vec<ParamSettingModel>,
    strategy: StrategyHandle,
) -> Result<OperationGroup, DepError> {
    let sorted: Vec<ParamSettingModel> =
        deps::sort(&models)?.into_iter().cloned().collect();
    let shared = Arc::new(sorted);

    Ok(OperationGroup::new(
        "parameter settings",
        "assign requested parameter values and formulas",
    )
    .with_operation(Operation::document(
        "apply-settings",
        "global assignment fast path",
        ApplyParamSettings {
            models: Arc::clone(&shared),
        },
    ))
    .with_operation(Operation::variant(
        "resolve-deferred",
        "per-variant assignment fallback",
        ResolveDeferredValues {
            models: shared,
            strategy,
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::CoercionRegistry;
    use crate::core::params::ParamSpec;
    use crate::core::types::{ParameterName, StorageKind, VariantName};
    use crate::doc::MemoryDocument;
    use crate::engine::log::{EntryStatus, LogEntry};
    use crate::engine::queue::{CompileOptions, OperationQueue};
    use crate::engine::RunContext;

    fn pname(s: &str) -> ParameterName {
        ParameterName::new(s).unwrap()
    }

    fn vname(s: &str) -> VariantName {
        VariantName::new(s).unwrap()
    }

    fn doc() -> MemoryDocument {
        MemoryDocument::new("Fixture", vec![vname("Small"), vname("Large")])
            .with_parameter(ParamSpec::plain(pname("Width"), StorageKind::Double))
            .with_parameter(ParamSpec::plain(pname("Depth"), StorageKind::Double))
            .with_parameter(ParamSpec::plain(pname("Material"), StorageKind::Text))
    }

    fn strategy() -> StrategyHandle {
        CoercionRegistry::with_builtins().get("composite").unwrap()
    }

    fn run_group(doc: &mut MemoryDocument, models: Vec<ParamSettingModel>) -> Vec<OperationLog> {
        let group = param_settings_group(models, strategy()).unwrap();
        let mut queue = OperationQueue::new();
        queue.add_group(group);
        let compiled = queue.compile(CompileOptions::default());

        let mut logs = Vec::new();
        doc.begin_transaction("test").unwrap();
        for exe in &compiled.executables {
            logs.extend(exe.execute(doc, &RunContext::default()));
        }
        doc.commit().unwrap();
        logs
    }

    /// The fallback's log carries the exported entries.
    fn exported(logs: &[OperationLog]) -> &[LogEntry] {
        &logs
            .iter()
            .find(|l| l.operation.contains("resolve-deferred"))
            .unwrap()
            .entries
    }

    fn entry<'a>(logs: &'a [OperationLog], name: &str) -> &'a LogEntry {
        exported(logs)
            .iter()
            .find(|e| e.name == name)
            .unwrap_or_else(|| panic!("no entry for {name}"))
    }

    #[test]
    fn global_literal_fills_every_variant() {
        let mut doc = doc();
        let logs = run_group(&mut doc, vec![ParamSettingModel::value(pname("Width"), "10")]);

        assert_eq!(entry(&logs, "Width").status(), EntryStatus::Success);
        for v in ["Small", "Large"] {
            doc.switch_variant(&vname(v)).unwrap();
            assert_eq!(doc.value(&pname("Width")).unwrap(), Some(ParamValue::Double(10.0)));
        }
    }

    #[test]
    fn text_parameter_defers_then_resolves_per_variant() {
        let mut doc = doc();
        let logs = run_group(
            &mut doc,
            vec![ParamSettingModel::value(pname("Material"), "Steel")],
        );

        let e = entry(&logs, "Material");
        assert_eq!(e.status(), EntryStatus::Success);
        // Deferral note from the fast path, then one assignment per variant.
        assert!(e.messages[0].contains("rejected"));
        assert!(e.messages.iter().filter(|m| m.contains("set ")).count() == 2);

        for v in ["Small", "Large"] {
            doc.switch_variant(&vname(v)).unwrap();
            assert_eq!(
                doc.value(&pname("Material")).unwrap(),
                Some(ParamValue::Text("Steel".into()))
            );
        }
    }

    #[test]
    fn per_variant_overrides_win_over_global_literal() {
        let mut doc = doc();
        run_group(
            &mut doc,
            vec![ParamSettingModel::value(pname("Depth"), "5")
                .with_variant_value(vname("Large"), "20")],
        );

        doc.switch_variant(&vname("Small")).unwrap();
        assert_eq!(doc.value(&pname("Depth")).unwrap(), Some(ParamValue::Double(5.0)));
        doc.switch_variant(&vname("Large")).unwrap();
        assert_eq!(doc.value(&pname("Depth")).unwrap(), Some(ParamValue::Double(20.0)));
    }

    #[test]
    fn formula_assignment_respects_dependency_order() {
        let mut doc = doc();
        // Depth depends on Width; requests given in the wrong order.
        let logs = run_group(
            &mut doc,
            vec![
                ParamSettingModel::value(pname("Depth"), "Width * 2").as_formula(),
                ParamSettingModel::value(pname("Width"), "10"),
            ],
        );

        assert_eq!(entry(&logs, "Depth").status(), EntryStatus::Success);
        assert_eq!(
            doc.formula(&pname("Depth")).unwrap().as_deref(),
            Some("Width * 2")
        );
    }

    #[test]
    fn missing_parameter_fails_its_entry_only() {
        let mut doc = doc();
        let logs = run_group(
            &mut doc,
            vec![
                ParamSettingModel::value(pname("Ghost"), "1"),
                ParamSettingModel::value(pname("Width"), "10"),
            ],
        );

        assert_eq!(entry(&logs, "Ghost").status(), EntryStatus::Error);
        assert_eq!(entry(&logs, "Width").status(), EntryStatus::Success);
    }

    #[test]
    fn override_only_request_assigns_covered_variants() {
        let mut doc = doc();
        let mut model = ParamSettingModel::value(pname("Depth"), "");
        model
            .values_per_variant
            .insert(vname("Large"), "20".into());
        let logs = run_group(&mut doc, vec![model]);

        // Still success: at least one variant was assigned.
        assert_eq!(entry(&logs, "Depth").status(), EntryStatus::Success);
        doc.switch_variant(&vname("Small")).unwrap();
        assert_eq!(doc.value(&pname("Depth")).unwrap(), None);
        doc.switch_variant(&vname("Large")).unwrap();
        assert_eq!(doc.value(&pname("Depth")).unwrap(), Some(ParamValue::Double(20.0)));
    }

    #[test]
    fn request_with_no_values_anywhere_is_skipped() {
        let mut doc = doc();
        let logs = run_group(&mut doc, vec![ParamSettingModel::value(pname("Depth"), "")]);
        assert_eq!(entry(&logs, "Depth").status(), EntryStatus::Skipped);
    }

    #[test]
    fn cycle_is_a_build_time_error() {
        let models = vec![
            ParamSettingModel::value(pname("A"), "B + 1").as_formula(),
            ParamSettingModel::value(pname("B"), "A + 1").as_formula(),
        ];
        let err = param_settings_group(models, strategy()).unwrap_err();
        assert!(matches!(err, DepError::Cycle { .. }));
    }
}
