//! engine::group
//!
//! Operation groups and their shared coordination context.
//!
//! # Architecture
//!
//! Some features need two cooperating operations: a fast path that tries a
//! cheap global action per work item, and a fallback that completes whatever
//! the fast path could not. They coordinate through an [`OperationContext`]:
//! the fast path defers incomplete items (entry stays `Pending` with a trail
//! of messages), the fallback fetches everything still incomplete and
//! terminates it.
//!
//! An [`OperationGroup`] bundles such operations. Adding a group to a queue
//! is the *only* way operations acquire a shared context, and `add_group`
//! inserts members contiguously - the cooperating pair cannot be separated
//! by construction.
//!
//! # Invariants
//!
//! - Contexts are reset, not reallocated, between documents (arena reuse
//!   across possibly hundreds of documents)
//! - `snapshot_and_clear` exports cloned entries and then clears transient
//!   messages, so exports never leak messages across documents
//! - Execution is single-threaded (see the concurrency model); the shared
//!   handle is `Rc<RefCell<_>>`, not a lock

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::log::LogEntry;
use super::op::Operation;

/// Shared handle to a group's coordination context.
///
/// Single-threaded by design: the document backend forbids concurrent
/// mutation, so no locking is needed or wanted here.
pub type SharedContext = Rc<RefCell<OperationContext>>;

/// Per-group coordination store, keyed by work-item name.
#[derive(Debug, Default)]
pub struct OperationContext {
    entries: BTreeMap<String, LogEntry>,
}

impl OperationContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared handle to a fresh context.
    pub fn shared() -> SharedContext {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Initialize a `Pending` entry for a work item.
    ///
    /// An existing entry is left untouched; initialization is idempotent
    /// within one document pass.
    pub fn init(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.entries
            .entry(name.clone())
            .or_insert_with(|| LogEntry::new(name));
    }

    /// Mutable access to one entry.
    pub fn entry_mut(&mut self, name: &str) -> Option<&mut LogEntry> {
        self.entries.get_mut(name)
    }

    /// Names of all entries still `Pending`, in key order.
    pub fn incomplete_names(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| !e.is_terminal())
            .map(|e| e.name.clone())
            .collect()
    }

    /// Mutable iterator over all entries still `Pending`.
    pub fn incomplete_mut(&mut self) -> impl Iterator<Item = &mut LogEntry> {
        self.entries.values_mut().filter(|e| !e.is_terminal())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the context holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return every entry to `Pending` with empty messages.
    ///
    /// Called at the start of each document's processing cycle so the same
    /// context object serves the whole batch.
    pub fn reset(&mut self) {
        for entry in self.entries.values_mut() {
            entry.reset();
        }
    }

    /// Clone all entries for export, then clear transient messages.
    ///
    /// The clones carry the full message trails; the stored entries keep
    /// their statuses but drop messages so the next document's pass starts
    /// from a clean trail.
    pub fn snapshot_and_clear(&mut self) -> Vec<LogEntry> {
        let snapshot: Vec<LogEntry> = self.entries.values().cloned().collect();
        for entry in self.entries.values_mut() {
            entry.clear_messages();
        }
        snapshot
    }
}

/// A named bundle of related operations sharing one context.
pub struct OperationGroup {
    name: String,
    description: String,
    operations: Vec<Operation>,
    context: SharedContext,
}

impl std::fmt::Debug for OperationGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationGroup")
            .field("name", &self.name)
            .field("description", &self.description)
            .field(
                "operations",
                &self.operations.iter().map(Operation::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl OperationGroup {
    /// Create an empty group with a fresh context.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            operations: Vec::new(),
            context: OperationContext::shared(),
        }
    }

    /// Add an operation (builder style). Order is execution order.
    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Group name, used to prefix member names when unwrapped into a queue.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The shared context handle.
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Decompose into (name, operations, context) for queue unwrapping.
    pub(crate) fn into_parts(self) -> (String, Vec<Operation>, SharedContext) {
        (self.name, self.operations, self.context)
    }
}
