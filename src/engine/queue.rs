//! engine::queue
//!
//! Queue accumulation and compilation.
//!
//! # Architecture
//!
//! Callers build an [`OperationQueue`] once (standalone operations and/or
//! groups), then compile it into executables per processing run. Compilation
//! is a linear single pass that greedily batches **consecutive**
//! variant-scoped operations into one [`MergedVariantOperation`]; any
//! document-scoped operation flushes the current batch. Only adjacency
//! matters: variant-scoped operations separated by a document-scoped one are
//! not merged together, which bounds the blast radius of a batch abort and
//! keeps document-scoped side effects correctly interleaved.
//!
//! # Invariants
//!
//! - Disabled operations are dropped at add time, never compiled
//! - Group members enter the queue contiguously, name-prefixed, sharing the
//!   group's context
//! - Compilation preserves operation order
//! - Compiling is cheap (shared handles, no operation clones); the same
//!   queue is reused across every document of a batch

use std::rc::Rc;

use serde::Serialize;

use crate::doc::Document;

use super::group::{OperationGroup, SharedContext};
use super::log::OperationLog;
use super::merged::MergedVariantOperation;
use super::op::Operation;
use super::RunContext;

/// Options controlling queue compilation.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// Batch consecutive variant-scoped operations into merged sweeps.
    pub merge_variant_ops: bool,
    /// Execute all compiled executables under one backend transaction
    /// instead of one transaction per executable. Trades partial-progress
    /// durability for atomicity; the host records exactly one transaction.
    pub single_transaction: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            merge_variant_ops: true,
            single_transaction: false,
        }
    }
}

/// Scope of a compiled executable, for metadata/reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecKind {
    /// One document-scoped operation.
    Document,
    /// One variant-scoped operation, unmerged.
    Variant,
    /// A merged batch of variant-scoped operations.
    MergedVariant {
        /// Number of member operations.
        members: usize,
    },
}

/// Name/description/kind of one compiled executable, for UI and reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutableMeta {
    /// Executable name (member names joined for merged batches).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Scope.
    pub kind: ExecKind,
}

/// One compiled unit of execution.
pub enum Executable {
    /// A single operation, document- or variant-scoped.
    Single(Rc<Operation>),
    /// A merged batch of variant-scoped operations.
    Merged(MergedVariantOperation),
}

impl Executable {
    /// Execute against a document, returning one log per operation.
    ///
    /// Never fails; failures are recorded in the logs (see `engine::op`).
    pub fn execute(&self, doc: &mut dyn Document, ctx: &RunContext) -> Vec<OperationLog> {
        match self {
            Executable::Single(op) => vec![op.execute(doc, ctx)],
            Executable::Merged(batch) => batch.execute(doc, ctx),
        }
    }

    /// Metadata for UI/reporting.
    pub fn meta(&self) -> ExecutableMeta {
        match self {
            Executable::Single(op) => ExecutableMeta {
                name: op.name().to_string(),
                description: op.description().to_string(),
                kind: if op.is_variant_scoped() {
                    ExecKind::Variant
                } else {
                    ExecKind::Document
                },
            },
            Executable::Merged(batch) => ExecutableMeta {
                name: batch.member_names().join(" + "),
                description: format!(
                    "merged sweep of {} variant-scoped operations",
                    batch.len()
                ),
                kind: ExecKind::MergedVariant {
                    members: batch.len(),
                },
            },
        }
    }
}

/// A compiled queue, ready for the processor.
pub struct CompiledQueue {
    /// Ordered executables.
    pub executables: Vec<Executable>,
    /// Run everything under one backend transaction.
    pub single_transaction: bool,
}

impl CompiledQueue {
    /// Metadata for every executable, in order.
    pub fn metadata(&self) -> Vec<ExecutableMeta> {
        self.executables.iter().map(Executable::meta).collect()
    }
}

/// Accumulates operations and compiles them into an executable list.
#[derive(Default)]
pub struct OperationQueue {
    operations: Vec<Rc<Operation>>,
}

impl std::fmt::Debug for OperationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationQueue")
            .field(
                "operations",
                &self.operations.iter().map(|op| op.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl OperationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a standalone operation. Disabled operations are dropped.
    pub fn add(&mut self, op: Operation) {
        if !op.enabled() {
            return;
        }
        self.operations.push(Rc::new(op));
    }

    /// Add a group: members are unwrapped in order, name-prefixed with the
    /// group name, and attached to the group's shared context. Disabled
    /// members are dropped individually.
    pub fn add_group(&mut self, group: OperationGroup) {
        let (name, operations, context) = group.into_parts();
        for mut op in operations {
            if !op.enabled() {
                continue;
            }
            op.prefix_name(&name);
            op.attach_context(Rc::clone(&context));
            self.operations.push(Rc::new(op));
        }
    }

    /// Number of operations that will compile.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the queue holds no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Names of the queued operations, in order.
    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name()).collect()
    }

    /// Reset every distinct group context to all-`Pending`, empty messages.
    ///
    /// Called at the start of each document's processing cycle; contexts are
    /// reused, not reallocated, across the batch.
    pub fn reset_all_group_contexts(&self) {
        let mut seen: Vec<&SharedContext> = Vec::new();
        for op in &self.operations {
            let Some(ctx) = op.context() else { continue };
            if seen.iter().any(|c| Rc::ptr_eq(c, ctx)) {
                continue;
            }
            ctx.borrow_mut().reset();
            seen.push(ctx);
        }
    }

    /// Compile the queue into an ordered executable list.
    pub fn compile(&self, options: CompileOptions) -> CompiledQueue {
        let mut executables = Vec::new();
        let mut batch: Vec<Rc<Operation>> = Vec::new();

        let flush = |batch: &mut Vec<Rc<Operation>>, executables: &mut Vec<Executable>| {
            match batch.len() {
                0 => {}
                1 => executables.push(Executable::Single(batch.remove(0))),
                _ => executables.push(Executable::Merged(MergedVariantOperation::new(
                    std::mem::take(batch),
                ))),
            }
        };

        for op in &self.operations {
            if options.merge_variant_ops && op.is_variant_scoped() {
                batch.push(Rc::clone(op));
            } else {
                flush(&mut batch, &mut executables);
                executables.push(Executable::Single(Rc::clone(op)));
            }
        }
        flush(&mut batch, &mut executables);

        CompiledQueue {
            executables,
            single_transaction: options.single_transaction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::DocError;
    use crate::engine::log::OperationLog;
    use crate::engine::op::{DocOp, Outcome, VariantOp, VariantPass};

    struct NoopDoc;
    impl DocOp for NoopDoc {
        fn apply(
            &self,
            _doc: &mut dyn Document,
            _log: &mut OperationLog,
            _group: Option<&SharedContext>,
        ) -> Result<(), DocError> {
            Ok(())
        }
    }

    struct NoopVariant;
    impl VariantOp for NoopVariant {
        fn apply(
            &self,
            _doc: &mut dyn Document,
            _pass: &VariantPass,
            _log: &mut OperationLog,
            _group: Option<&SharedContext>,
        ) -> Result<Outcome, DocError> {
            Ok(Outcome::Continue)
        }
    }

    fn doc_op(name: &str) -> Operation {
        Operation::document(name, "doc-scoped", NoopDoc)
    }

    fn var_op(name: &str) -> Operation {
        Operation::variant(name, "variant-scoped", NoopVariant)
    }

    fn kinds(compiled: &CompiledQueue) -> Vec<ExecKind> {
        compiled.metadata().into_iter().map(|m| m.kind).collect()
    }

    mod add {
        use super::*;

        #[test]
        fn disabled_operations_dropped() {
            let mut queue = OperationQueue::new();
            queue.add(doc_op("a"));
            queue.add(doc_op("b").with_enabled(false));
            assert_eq!(queue.operation_names(), vec!["a"]);
        }

        #[test]
        fn group_members_prefixed_and_contiguous() {
            let mut queue = OperationQueue::new();
            queue.add(doc_op("before"));
            let group = OperationGroup::new("settings", "settings feature")
                .with_operation(doc_op("fast"))
                .with_operation(var_op("fallback"))
                .with_operation(doc_op("disabled").with_enabled(false));
            queue.add_group(group);

            assert_eq!(
                queue.operation_names(),
                vec!["before", "settings: fast", "settings: fallback"]
            );
        }
    }

    mod compile {
        use super::*;

        #[test]
        fn consecutive_variant_ops_merge() {
            let mut queue = OperationQueue::new();
            queue.add(var_op("v1"));
            queue.add(var_op("v2"));
            queue.add(var_op("v3"));

            let compiled = queue.compile(CompileOptions::default());
            assert_eq!(kinds(&compiled), vec![ExecKind::MergedVariant { members: 3 }]);
        }

        #[test]
        fn doc_op_flushes_batch() {
            let mut queue = OperationQueue::new();
            queue.add(var_op("v1"));
            queue.add(var_op("v2"));
            queue.add(doc_op("d"));
            queue.add(var_op("v3"));
            queue.add(var_op("v4"));

            let compiled = queue.compile(CompileOptions::default());
            assert_eq!(
                kinds(&compiled),
                vec![
                    ExecKind::MergedVariant { members: 2 },
                    ExecKind::Document,
                    ExecKind::MergedVariant { members: 2 },
                ]
            );
        }

        #[test]
        fn non_adjacent_variant_ops_never_merge() {
            let mut queue = OperationQueue::new();
            queue.add(var_op("v1"));
            queue.add(doc_op("d"));
            queue.add(var_op("v2"));

            let compiled = queue.compile(CompileOptions::default());
            assert_eq!(
                kinds(&compiled),
                vec![ExecKind::Variant, ExecKind::Document, ExecKind::Variant]
            );
        }

        #[test]
        fn lone_variant_op_stays_single() {
            let mut queue = OperationQueue::new();
            queue.add(var_op("v1"));
            let compiled = queue.compile(CompileOptions::default());
            assert_eq!(kinds(&compiled), vec![ExecKind::Variant]);
        }

        #[test]
        fn merging_disabled_compiles_all_singles() {
            let mut queue = OperationQueue::new();
            queue.add(var_op("v1"));
            queue.add(var_op("v2"));
            let compiled = queue.compile(CompileOptions {
                merge_variant_ops: false,
                ..Default::default()
            });
            assert_eq!(kinds(&compiled), vec![ExecKind::Variant, ExecKind::Variant]);
        }

        #[test]
        fn order_preserved() {
            let mut queue = OperationQueue::new();
            queue.add(doc_op("first"));
            queue.add(var_op("second"));
            queue.add(doc_op("third"));

            let compiled = queue.compile(CompileOptions::default());
            let names: Vec<String> =
                compiled.metadata().into_iter().map(|m| m.name).collect();
            assert_eq!(names, vec!["first", "second", "third"]);
        }

        #[test]
        fn single_transaction_flag_carried() {
            let queue = OperationQueue::new();
            let compiled = queue.compile(CompileOptions {
                single_transaction: true,
                ..Default::default()
            });
            assert!(compiled.single_transaction);
        }

        #[test]
        fn merged_metadata_names_members() {
            let mut queue = OperationQueue::new();
            queue.add(var_op("v1"));
            queue.add(var_op("v2"));
            let compiled = queue.compile(CompileOptions::default());
            assert_eq!(compiled.metadata()[0].name, "v1 + v2");
        }
    }

    mod contexts {
        use super::*;

        #[test]
        fn reset_all_resets_each_context_once() {
            let group_a = OperationGroup::new("a", "first")
                .with_operation(var_op("one"))
                .with_operation(var_op("two"));
            let ctx_a = Rc::clone(group_a.context());
            let group_b = OperationGroup::new("b", "second").with_operation(var_op("three"));
            let ctx_b = Rc::clone(group_b.context());

            let mut queue = OperationQueue::new();
            queue.add_group(group_a);
            queue.add_group(group_b);

            ctx_a.borrow_mut().init("P");
            ctx_a.borrow_mut().entry_mut("P").unwrap().succeed("done").unwrap();
            ctx_b.borrow_mut().init("Q");
            ctx_b.borrow_mut().entry_mut("Q").unwrap().fail("boom").unwrap();

            queue.reset_all_group_contexts();

            assert_eq!(ctx_a.borrow_mut().incomplete_names(), vec!["P"]);
            assert_eq!(ctx_b.borrow_mut().incomplete_names(), vec!["Q"]);
        }

        #[test]
        fn standalone_ops_have_no_context() {
            let mut queue = OperationQueue::new();
            queue.add(doc_op("solo"));
            // Nothing to reset; must not panic.
            queue.reset_all_group_contexts();
        }
    }
}
