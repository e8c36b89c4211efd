//! engine
//!
//! Orchestrates batch processing: Queue -> Compile -> Execute -> Report.
//!
//! # Architecture
//!
//! The engine turns declarative operation lists into per-document runs:
//!
//! 1. **Queue**: accumulate operations and groups ([`queue::OperationQueue`])
//! 2. **Compile**: batch adjacent variant-scoped operations into merged
//!    sweeps ([`queue::CompiledQueue`])
//! 3. **Execute**: run every executable against each document, recording
//!    per-unit results ([`log::OperationLog`])
//! 4. **Report**: collect per-document contexts with snapshots and timing
//!    ([`processor::FamilyProcessingContext`])
//!
//! # Invariants
//!
//! - Operation failures are recorded in logs, never thrown past the
//!   processor; one document's failure cannot stop the batch
//! - Compilation preserves queue order; only adjacent variant-scoped
//!   operations merge
//! - Group contexts are reset at each document boundary and reused across
//!   the whole batch
//! - Execution is single-threaded; the document backend forbids concurrent
//!   mutation

pub mod group;
pub mod log;
pub mod merged;
pub mod op;
pub mod processor;
pub mod queue;

pub use group::{OperationContext, OperationGroup, SharedContext};
pub use log::{EntryStatus, LogEntry, LogError, OperationLog};
pub use merged::MergedVariantOperation;
pub use op::{DocOp, Operation, Outcome, VariantOp, VariantPass};
pub use processor::{
    FamilyProcessingContext, OperationProcessor, ParameterValueCollector, ProcessError,
    ProcessOptions, SnapshotCollector, SnapshotSet, VariantSpec,
};
pub use queue::{CompileOptions, CompiledQueue, Executable, ExecutableMeta, OperationQueue};

/// Run-wide execution settings shared by every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunContext {
    /// Emit `[debug]` diagnostics on stderr.
    pub debug: bool,
    /// Suppress normal progress output.
    pub quiet: bool,
}

impl RunContext {
    /// Print a progress line unless quiet mode is on.
    pub fn progress(&self, message: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", message.as_ref());
        }
    }

    /// Print a `[debug]` line when debug mode is on.
    pub fn trace(&self, message: impl AsRef<str>) {
        if self.debug {
            eprintln!("[debug] {}", message.as_ref());
        }
    }
}
