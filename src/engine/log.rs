//! engine::log
//!
//! Append-only result records for units of work.
//!
//! # Architecture
//!
//! Every unit of work an operation performs - one parameter on one variant,
//! one document-level action - is recorded as a [`LogEntry`]. Entries start
//! `Pending` and move to exactly one terminal status. [`OperationLog`] groups
//! the entries produced by one operation and carries its elapsed time.
//!
//! # Invariants
//!
//! - `Pending -> {Success | Skipped | Error}` is the only legal transition
//! - Re-terminating a terminal entry is a defensive error
//!   ([`LogError::AlreadyTerminal`]) and leaves the entry unchanged; it
//!   guards against double counting in the merge and group-deferral
//!   protocols
//! - [`LogEntry::defer`] appends a message without changing status, leaving
//!   the entry for the next cooperating operation to inspect

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::VariantName;

/// Errors from log-entry transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    /// A terminal transition was applied to an already-terminal entry.
    #[error("log entry '{name}' is already terminal ({current})")]
    AlreadyTerminal {
        /// Entry name
        name: String,
        /// Current terminal status
        current: EntryStatus,
    },
}

/// Status of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Not yet resolved; cooperating operations may still act on it.
    Pending,
    /// Work completed.
    Success,
    /// Nothing to do (benign; includes operation aborts).
    Skipped,
    /// Work failed.
    Error,
}

impl EntryStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EntryStatus::Pending)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Success => "success",
            EntryStatus::Skipped => "skipped",
            EntryStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// The result record for one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Work-item name (typically a parameter name or an operation name).
    pub name: String,
    /// Current status.
    status: EntryStatus,
    /// Variant the entry was produced under, if variant-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<VariantName>,
    /// Ordered trail of messages (attempted actions, deferral notes).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<String>,
    /// Error detail for `Error` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogEntry {
    /// Create a pending entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: EntryStatus::Pending,
            variant: None,
            messages: Vec::new(),
            error: None,
        }
    }

    /// Tag the entry with the variant it was produced under (builder style).
    pub fn with_variant(mut self, variant: VariantName) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Current status.
    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Whether the entry has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a message without changing status.
    ///
    /// Used by the fast path of a cooperating operation pair: the entry stays
    /// `Pending` with a trail of attempted actions for the fallback to read.
    pub fn defer(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    fn terminate(&mut self, status: EntryStatus) -> Result<(), LogError> {
        if self.is_terminal() {
            return Err(LogError::AlreadyTerminal {
                name: self.name.clone(),
                current: self.status,
            });
        }
        self.status = status;
        Ok(())
    }

    /// Mark the entry successful.
    pub fn succeed(&mut self, message: impl Into<String>) -> Result<(), LogError> {
        self.terminate(EntryStatus::Success)?;
        self.messages.push(message.into());
        Ok(())
    }

    /// Mark the entry skipped.
    pub fn skip(&mut self, reason: impl Into<String>) -> Result<(), LogError> {
        self.terminate(EntryStatus::Skipped)?;
        self.messages.push(reason.into());
        Ok(())
    }

    /// Mark the entry failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), LogError> {
        self.terminate(EntryStatus::Error)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Clear transient messages, keeping name, status, and variant tag.
    pub(crate) fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Return the entry to `Pending` with no messages or error.
    ///
    /// Only group contexts reset entries, at document boundaries; terminal
    /// statuses stay terminal everywhere else.
    pub(crate) fn reset(&mut self) {
        self.status = EntryStatus::Pending;
        self.messages.clear();
        self.error = None;
    }
}

/// All entries produced by one operation, with timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationLog {
    /// Operation name.
    pub operation: String,
    /// Result entries, in production order.
    pub entries: Vec<LogEntry>,
    /// Wall-clock time attributed to this operation.
    #[serde(default)]
    pub elapsed: Duration,
}

impl OperationLog {
    /// Create an empty log for an operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            entries: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Append an entry.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    fn count(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status() == status).count()
    }

    /// Number of `Success` entries.
    pub fn success_count(&self) -> usize {
        self.count(EntryStatus::Success)
    }

    /// Number of `Skipped` entries.
    pub fn skipped_count(&self) -> usize {
        self.count(EntryStatus::Skipped)
    }

    /// Number of `Error` entries.
    pub fn error_count(&self) -> usize {
        self.count(EntryStatus::Error)
    }

    /// Number of entries still `Pending`.
    pub fn pending_count(&self) -> usize {
        self.count(EntryStatus::Pending)
    }

    /// Whether any entry failed.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}
