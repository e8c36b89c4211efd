//! engine::op
//!
//! The operation abstraction.
//!
//! # Architecture
//!
//! An [`Operation`] is one configured unit of document transformation. Its
//! scope is a closed enum, [`OpKind`]: document-scoped operations run once
//! per document, variant-scoped operations run once per variant. The queue
//! compiler pattern-matches on the kind to batch adjacent variant-scoped
//! operations into one sweep, so scope detection never needs reflection.
//!
//! Variant-scoped work signals early termination with an explicit
//! [`Outcome::Abort`] tag instead of a control-flow exception; the executors
//! inspect the tag. An abort means "no more useful work for this operation" -
//! it is benign and distinct from a real failure, which is an `Err`.
//!
//! # Invariants
//!
//! - A failing operation converts into an `Error` log entry; it never aborts
//!   the queue
//! - Variant iteration visits the current variant first, then the remaining
//!   variants in lexicographic order (minimizes pointless switches, keeps
//!   output deterministic)
//! - An operation's name is rewritten only at queue-build time (group
//!   prefixing); it is immutable during execution

use std::time::Instant;

use crate::core::types::VariantName;
use crate::doc::{DocError, Document};

use super::group::SharedContext;
use super::log::{LogEntry, OperationLog};
use super::RunContext;

/// Result tag from one variant-scoped call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Keep iterating.
    Continue,
    /// No more useful work for this operation; stop its iteration.
    ///
    /// Benign: recorded as one `Skipped` entry. Sibling operations in a
    /// merged batch are unaffected.
    Abort(String),
}

/// Position of one variant call within an iteration sweep.
///
/// Cooperating operations use [`VariantPass::is_last`] to know when the sweep
/// is complete (e.g. to terminate a deferred context entry after the final
/// per-variant assignment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPass {
    /// The variant this call runs against (already made current).
    pub variant: VariantName,
    /// Zero-based position in the sweep.
    pub index: usize,
    /// Total variants in the sweep.
    pub total: usize,
}

impl VariantPass {
    /// Whether this is the final variant of the sweep.
    pub fn is_last(&self) -> bool {
        self.index + 1 == self.total
    }
}

/// A document-scoped unit of work.
pub trait DocOp {
    /// Run against the document once.
    ///
    /// Entries are appended to `log`; `group` is present when the operation
    /// belongs to an [`super::group::OperationGroup`].
    fn apply(
        &self,
        doc: &mut dyn Document,
        log: &mut OperationLog,
        group: Option<&SharedContext>,
    ) -> Result<(), DocError>;
}

/// A variant-scoped unit of work.
pub trait VariantOp {
    /// Run against one variant. The executor has already made
    /// `pass.variant` the current variant.
    fn apply(
        &self,
        doc: &mut dyn Document,
        pass: &VariantPass,
        log: &mut OperationLog,
        group: Option<&SharedContext>,
    ) -> Result<Outcome, DocError>;
}

/// Operation scope and behavior.
pub enum OpKind {
    /// Runs once per document.
    Document(Box<dyn DocOp>),
    /// Runs once per variant.
    Variant(Box<dyn VariantOp>),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Document(_) => f.write_str("OpKind::Document"),
            OpKind::Variant(_) => f.write_str("OpKind::Variant"),
        }
    }
}

/// One configured unit of document transformation.
#[derive(Debug)]
pub struct Operation {
    name: String,
    description: String,
    enabled: bool,
    kind: OpKind,
    context: Option<SharedContext>,
}

impl Operation {
    /// Create a document-scoped operation.
    pub fn document(
        name: impl Into<String>,
        description: impl Into<String>,
        op: impl DocOp + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            enabled: true,
            kind: OpKind::Document(Box::new(op)),
            context: None,
        }
    }

    /// Create a variant-scoped operation.
    pub fn variant(
        name: impl Into<String>,
        description: impl Into<String>,
        op: impl VariantOp + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            enabled: true,
            kind: OpKind::Variant(Box::new(op)),
            context: None,
        }
    }

    /// Set the enabled flag (builder style). Disabled operations are dropped
    /// when added to a queue and never compiled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Operation name (identity).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the operation is enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the operation is variant-scoped.
    pub fn is_variant_scoped(&self) -> bool {
        matches!(self.kind, OpKind::Variant(_))
    }

    /// The group context, if the operation belongs to a group.
    pub fn context(&self) -> Option<&SharedContext> {
        self.context.as_ref()
    }

    /// The variant-scoped behavior, if this operation has one.
    pub(crate) fn as_variant_op(&self) -> Option<&dyn VariantOp> {
        match &self.kind {
            OpKind::Variant(op) => Some(op.as_ref()),
            OpKind::Document(_) => None,
        }
    }

    /// Prefix the name with a group name. Called once when a group is
    /// unwrapped into a queue.
    pub(crate) fn prefix_name(&mut self, group: &str) {
        self.name = format!("{group}: {}", self.name);
    }

    /// Attach a group's shared context.
    pub(crate) fn attach_context(&mut self, context: SharedContext) {
        self.context = Some(context);
    }

    /// Execute this operation alone against a document.
    ///
    /// Never fails: a backend error escaping the operation converts into a
    /// single `Error` entry tagged `(FATAL ERROR)`, and an abort converts
    /// into a single `Skipped` entry.
    pub fn execute(&self, doc: &mut dyn Document, ctx: &RunContext) -> OperationLog {
        let started = Instant::now();
        let mut log = OperationLog::new(&self.name);

        match &self.kind {
            OpKind::Document(op) => {
                if let Err(e) = op.apply(doc, &mut log, self.context.as_ref()) {
                    log.push(fatal_entry(&self.name, None, &e));
                }
            }
            OpKind::Variant(op) => {
                let plan = variant_plan(doc);
                let total = plan.len();
                for (index, variant) in plan.into_iter().enumerate() {
                    let pass = VariantPass {
                        variant: variant.clone(),
                        index,
                        total,
                    };
                    if ctx.debug {
                        eprintln!("[debug] {}: variant '{}'", self.name, variant);
                    }
                    if let Err(e) = doc.switch_variant(&variant) {
                        log.push(fatal_entry(&self.name, Some(variant), &e));
                        continue;
                    }
                    match op.apply(doc, &pass, &mut log, self.context.as_ref()) {
                        Ok(Outcome::Continue) => {}
                        Ok(Outcome::Abort(reason)) => {
                            let mut entry =
                                LogEntry::new(&self.name).with_variant(variant);
                            // Fresh entry; skip cannot fail.
                            let _ = entry.skip(reason);
                            log.push(entry);
                            break;
                        }
                        Err(e) => {
                            // Per-variant failure; iteration continues.
                            log.push(fatal_entry(&self.name, Some(variant), &e));
                        }
                    }
                }
            }
        }

        log.elapsed = started.elapsed();
        log
    }
}

/// Variant iteration order: current variant first, the rest lexicographic.
pub(crate) fn variant_plan(doc: &dyn Document) -> Vec<VariantName> {
    let current = doc.current_variant();
    let mut rest: Vec<VariantName> = doc
        .variants()
        .into_iter()
        .filter(|v| *v != current)
        .collect();
    rest.sort();
    let mut plan = Vec::with_capacity(rest.len() + 1);
    plan.push(current);
    plan.extend(rest);
    plan
}

/// Build the single `Error` entry for a failure escaping an operation.
pub(crate) fn fatal_entry(
    operation: &str,
    variant: Option<VariantName>,
    error: &DocError,
) -> LogEntry {
    let mut entry = LogEntry::new(format!("{operation} (FATAL ERROR)"));
    if let Some(v) = variant {
        entry = entry.with_variant(v);
    }
    // Fresh entry; fail cannot fail.
    let _ = entry.fail(error.to_string());
    entry
}
