//! engine::merged
//!
//! The merged variant sweep.
//!
//! # Architecture
//!
//! Switching the active variant is the expensive backend call: it is global,
//! stateful document mutation. Running k variant-scoped operations naively
//! costs k full variant iterations. [`MergedVariantOperation`] runs them all
//! in **one** sweep: for each variant (current first, then lexicographic),
//! switch once, then run every non-aborted member against it, amortizing the
//! switch cost across the member count.
//!
//! # Invariants
//!
//! - An abort removes only that member from later passes; siblings continue
//! - Once every member has aborted, the sweep stops early
//! - A member returning an ordinary error ends the whole batch with a fatal
//!   entry (die-fast; a silently partial merged result could be mistaken for
//!   a complete one)
//! - A failed variant switch records a fatal entry per active member and the
//!   sweep continues with the next variant, as unmerged execution would
//! - Logs are grouped per member operation after the sweep, each entry
//!   tagged with the variant it was produced under

use std::collections::HashSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::doc::Document;

use super::log::{LogEntry, OperationLog};
use super::op::{fatal_entry, variant_plan, Operation, Outcome, VariantPass};
use super::RunContext;

/// Several variant-scoped operations executed in one variant sweep.
pub struct MergedVariantOperation {
    ops: Vec<Rc<Operation>>,
}

impl MergedVariantOperation {
    /// Bundle variant-scoped operations.
    ///
    /// The queue compiler only merges adjacent variant-scoped operations;
    /// a document-scoped member here is a compiler bug.
    pub(crate) fn new(ops: Vec<Rc<Operation>>) -> Self {
        debug_assert!(ops.iter().all(|op| op.is_variant_scoped()));
        Self { ops }
    }

    /// Names of the member operations, in execution order.
    pub fn member_names(&self) -> Vec<&str> {
        self.ops.iter().map(|op| op.name()).collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no members.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Run the sweep, returning one log per member operation.
    pub fn execute(&self, doc: &mut dyn Document, ctx: &RunContext) -> Vec<OperationLog> {
        let mut logs: Vec<OperationLog> = self
            .ops
            .iter()
            .map(|op| OperationLog::new(op.name()))
            .collect();
        let mut elapsed: Vec<Duration> = vec![Duration::ZERO; self.ops.len()];
        let mut aborted: HashSet<usize> = HashSet::new();

        let plan = variant_plan(doc);
        let total = plan.len();

        'sweep: for (index, variant) in plan.into_iter().enumerate() {
            if aborted.len() == self.ops.len() {
                break;
            }
            if ctx.debug {
                eprintln!(
                    "[debug] merged sweep: variant '{}' ({} of {})",
                    variant,
                    index + 1,
                    total
                );
            }
            if let Err(e) = doc.switch_variant(&variant) {
                // The switch serves every active member; record the failure
                // against each of them and move to the next variant, the
                // same per-variant containment unmerged execution has.
                for (i, op) in self.ops.iter().enumerate() {
                    if !aborted.contains(&i) {
                        logs[i].push(fatal_entry(op.name(), Some(variant.clone()), &e));
                    }
                }
                continue;
            }
            let pass = VariantPass {
                variant: variant.clone(),
                index,
                total,
            };

            for (i, op) in self.ops.iter().enumerate() {
                if aborted.contains(&i) {
                    continue;
                }
                let variant_op = op
                    .as_variant_op()
                    .expect("merged batch members are variant-scoped");
                let started = Instant::now();
                let result = variant_op.apply(doc, &pass, &mut logs[i], op.context());
                elapsed[i] += started.elapsed();

                match result {
                    Ok(Outcome::Continue) => {}
                    Ok(Outcome::Abort(reason)) => {
                        let mut entry =
                            LogEntry::new(op.name()).with_variant(variant.clone());
                        let _ = entry.skip(reason);
                        logs[i].push(entry);
                        aborted.insert(i);
                    }
                    Err(e) => {
                        logs[i].push(fatal_entry(op.name(), Some(variant.clone()), &e));
                        break 'sweep;
                    }
                }
            }
        }

        for (log, spent) in logs.iter_mut().zip(elapsed) {
            log.elapsed = spent;
        }
        logs
    }
}
