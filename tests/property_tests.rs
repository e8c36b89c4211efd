//! Property-based tests for the dependency sorter and the merge compiler.
//!
//! These use proptest to verify invariants hold across randomly generated
//! inputs.

use std::collections::BTreeSet;

use proptest::prelude::*;

use famforge::core::deps::{self, references};
use famforge::core::params::ParamSettingModel;
use famforge::core::types::{ParameterName, VariantName};
use famforge::doc::{DocError, Document, MemoryDocument};
use famforge::engine::{
    CompileOptions, LogEntry, Operation, OperationLog, OperationQueue, Outcome, RunContext,
    SharedContext, VariantOp, VariantPass,
};

/// Strategy for valid parameter identifiers.
fn identifier() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,8}".prop_map(String::from)
}

/// Distinct identifiers, at least `min` of them.
fn identifiers(min: usize, max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(identifier(), min..=max)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    /// A whole-token reference is found; the same name embedded in a longer
    /// identifier is not.
    #[test]
    fn references_respects_token_boundaries(
        name in identifier(),
        suffix in "[A-Za-z0-9_]{1,4}",
    ) {
        let plus = format!("{name} + 2");
        let times = format!("2*{name}");
        let longer = format!("{name}{suffix} + 2");
        prop_assert!(references(&plus, &name));
        prop_assert!(references(&times, &name));
        prop_assert!(!references(&longer, &name));
    }

    /// Requests without formulas sort in input order.
    #[test]
    fn sort_without_formulas_preserves_order(names in identifiers(1, 8)) {
        let models: Vec<ParamSettingModel> = names
            .iter()
            .map(|n| ParamSettingModel::value(ParameterName::new(n.clone()).unwrap(), "1"))
            .collect();
        let sorted = deps::sort(&models).unwrap();
        let sorted_names: Vec<&str> = sorted.iter().map(|m| m.name.as_str()).collect();
        let input_names: Vec<&str> = names.iter().map(String::as_str).collect();
        prop_assert_eq!(sorted_names, input_names);
    }

    /// A shuffled dependency chain always sorts dependencies first.
    #[test]
    fn shuffled_chain_sorts_dependencies_first(
        names in identifiers(2, 6),
        seed in any::<u64>(),
    ) {
        // Chain: names[i] depends on names[i-1].
        let mut models: Vec<ParamSettingModel> = Vec::new();
        for (i, n) in names.iter().enumerate() {
            let name = ParameterName::new(n.clone()).unwrap();
            if i == 0 {
                models.push(ParamSettingModel::value(name, "1"));
            } else {
                models.push(
                    ParamSettingModel::value(name, names[i - 1].clone()).as_formula(),
                );
            }
        }
        // Deterministic shuffle from the seed.
        let mut shuffled = models.clone();
        let mut state = seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state % (i as u64 + 1)) as usize;
            shuffled.swap(i, j);
        }

        let sorted = deps::sort(&shuffled).unwrap();
        let position = |n: &str| sorted.iter().position(|m| m.name.as_str() == n).unwrap();
        for i in 1..names.len() {
            prop_assert!(
                position(&names[i - 1]) < position(&names[i]),
                "{} must sort before {}",
                names[i - 1],
                names[i]
            );
        }
    }
}

/// Records a success entry per variant.
struct Visitor {
    label: String,
}

impl VariantOp for Visitor {
    fn apply(
        &self,
        _doc: &mut dyn Document,
        pass: &VariantPass,
        log: &mut OperationLog,
        _group: Option<&SharedContext>,
    ) -> Result<Outcome, DocError> {
        let mut entry = LogEntry::new(self.label.clone()).with_variant(pass.variant.clone());
        entry.succeed("visited").unwrap();
        log.push(entry);
        Ok(Outcome::Continue)
    }
}

fn run(op_count: usize, variant_count: usize, merge: bool) -> BTreeSet<(String, String)> {
    let variants: Vec<VariantName> = (0..variant_count)
        .map(|i| VariantName::new(format!("V{i}")).unwrap())
        .collect();
    let mut doc = MemoryDocument::new("Fixture", variants);

    let mut queue = OperationQueue::new();
    for i in 0..op_count {
        let label = format!("op{i}");
        queue.add(Operation::variant(
            label.clone(),
            "visits variants",
            Visitor { label },
        ));
    }

    let compiled = queue.compile(CompileOptions {
        merge_variant_ops: merge,
        ..Default::default()
    });
    let mut set = BTreeSet::new();
    doc.begin_transaction("test").unwrap();
    for exe in &compiled.executables {
        for log in exe.execute(&mut doc, &RunContext::default()) {
            for entry in &log.entries {
                set.insert((
                    log.operation.clone(),
                    entry.variant.as_ref().map(|v| v.to_string()).unwrap_or_default(),
                ));
            }
        }
    }
    doc.commit().unwrap();
    set
}

proptest! {
    /// Merging changes the sweep structure, never the (operation, variant)
    /// work set.
    #[test]
    fn merge_is_observationally_equivalent(
        op_count in 1usize..5,
        variant_count in 1usize..5,
    ) {
        let merged = run(op_count, variant_count, true);
        let unmerged = run(op_count, variant_count, false);
        prop_assert_eq!(&merged, &unmerged);
        prop_assert_eq!(merged.len(), op_count * variant_count);
    }
}
