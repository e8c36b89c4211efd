//! engine::processor
//!
//! Top-level batch orchestration.
//!
//! # Architecture
//!
//! The processor owns a [`DocumentHost`] and a selection of document names.
//! For each selected document it runs one full cycle: reset group contexts,
//! open, execute the compiled queue under transactional scoping, collect
//! before/after snapshots, save the result and load it back into the host,
//! close. Everything a cycle produces lands in one
//! [`FamilyProcessingContext`].
//!
//! # Invariants
//!
//! - Documents are processed strictly sequentially; one is fully processed
//!   (or has its failure captured) before the next is opened
//! - An error escaping a document's cycle rolls back any open transaction
//!   and closes the document, then is captured into that document's
//!   context; the batch continues ([`OperationProcessor::process`]).
//!   [`OperationProcessor::process_strict`] re-throws the first captured
//!   error only after every document has been attempted
//! - The queue is compiled once per run and shared across documents

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::doc::{DocError, Document, DocumentHost, SaveOptions};

use super::log::OperationLog;
use super::queue::{CompileOptions, CompiledQueue, OperationQueue};
use super::RunContext;

/// Errors from batch orchestration.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A selected document name is not present in the host session.
    #[error("unknown document: {name}")]
    UnknownDocument {
        /// The name that did not match any document
        name: String,
    },

    /// Strict mode: a document's cycle failed.
    #[error("processing '{family}' failed: {message}")]
    DocumentFailed {
        /// The failed document
        family: String,
        /// Captured failure message
        message: String,
    },
}

/// Collects a named snapshot of a document's state.
///
/// Collectors run before the first executable and again after the last, so a
/// caller can diff what a run actually changed.
pub trait SnapshotCollector {
    /// Snapshot name, used as the key in the context's snapshot maps.
    fn name(&self) -> &str;

    /// Produce the snapshot value.
    fn collect(&self, doc: &dyn Document) -> Result<serde_json::Value, DocError>;
}

/// Built-in collector: every parameter's value on the current variant.
pub struct ParameterValueCollector;

impl SnapshotCollector for ParameterValueCollector {
    fn name(&self) -> &str {
        "parameter_values"
    }

    fn collect(&self, doc: &dyn Document) -> Result<serde_json::Value, DocError> {
        let mut map = serde_json::Map::new();
        for name in doc.parameters() {
            let value = doc.value(&name)?;
            map.insert(name.to_string(), serde_json::to_value(value)?);
        }
        Ok(serde_json::Value::Object(map))
    }
}

/// One named set of snapshots with integrity digests and timings.
#[derive(Debug, Default, Serialize)]
pub struct SnapshotSet {
    /// Snapshot values by collector name.
    pub values: BTreeMap<String, serde_json::Value>,
    /// SHA-256 hex digest of each snapshot's compact JSON encoding.
    pub digests: BTreeMap<String, String>,
    /// Collection time per collector.
    pub timings: BTreeMap<String, Duration>,
}

/// Per-document aggregate of one processing cycle.
#[derive(Debug)]
pub struct FamilyProcessingContext {
    /// Document (family) name.
    pub family: String,
    /// Unique id for this document's cycle.
    pub run_id: Uuid,
    /// Wall-clock start of the cycle.
    pub started_at: DateTime<Utc>,
    /// Operation logs, or the failure that ended the cycle.
    pub outcome: Result<Vec<OperationLog>, String>,
    /// Total cycle time.
    pub elapsed: Duration,
    /// Snapshots taken before the first executable.
    pub pre_snapshots: SnapshotSet,
    /// Snapshots taken after the last executable.
    pub post_snapshots: SnapshotSet,
    /// Where the processed document was written, when an output directory
    /// was configured.
    pub saved_to: Option<PathBuf>,
}

impl FamilyProcessingContext {
    /// Whether the cycle failed, either wholesale or in any log entry.
    pub fn has_errors(&self) -> bool {
        match &self.outcome {
            Ok(logs) => logs.iter().any(OperationLog::has_errors),
            Err(_) => true,
        }
    }
}

/// Options for one processing run.
#[derive(Default)]
pub struct ProcessOptions {
    /// Queue compilation options.
    pub compile: CompileOptions,
    /// Run-wide execution settings.
    pub run: RunContext,
    /// Directory to save processed documents into. `None` skips save/load.
    pub output_dir: Option<PathBuf>,
    /// Save behavior when `output_dir` is set.
    pub save: SaveOptions,
}

/// One derived output in a one-source/N-outputs run.
pub struct VariantSpec {
    /// Output document name (file stem under the output directory).
    pub output_name: String,
    /// Queue producing this output.
    pub queue: OperationQueue,
}

/// Batch orchestrator over a document host.
pub struct OperationProcessor<H: DocumentHost> {
    host: H,
    selected: Vec<String>,
}

impl<H: DocumentHost> OperationProcessor<H> {
    /// Create a processor with nothing selected.
    pub fn new(host: H) -> Self {
        Self {
            host,
            selected: Vec::new(),
        }
    }

    /// Select every document the host knows about. Returns the count.
    pub fn select_all(&mut self) -> usize {
        self.selected = self.host.document_names();
        self.selected.len()
    }

    /// Select documents by name, in the given order.
    pub fn select<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), ProcessError> {
        let known = self.host.document_names();
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !known.iter().any(|k| k == name) {
                return Err(ProcessError::UnknownDocument { name: name.into() });
            }
            selected.push(name.to_string());
        }
        self.selected = selected;
        Ok(())
    }

    /// Currently selected document names.
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// The underlying host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Run the queue against every selected document.
    ///
    /// Never fails: each document's failure is captured in its context and
    /// the batch moves on. Returns the contexts in selection order and the
    /// total wall-clock time.
    pub fn process(
        &mut self,
        queue: &OperationQueue,
        collectors: &[Box<dyn SnapshotCollector>],
        options: &ProcessOptions,
    ) -> (Vec<FamilyProcessingContext>, Duration) {
        let batch_started = Instant::now();
        let compiled = queue.compile(options.compile);
        let names = self.selected.clone();
        let mut contexts = Vec::with_capacity(names.len());

        for name in names {
            options.run.progress(format!("processing '{name}'"));
            let run_id = Uuid::new_v4();
            let started_at = Utc::now();
            let cycle_started = Instant::now();

            queue.reset_all_group_contexts();
            let mut pre = SnapshotSet::default();
            let mut post = SnapshotSet::default();
            let mut saved_to = None;
            let outcome = self
                .run_cycle(
                    &name,
                    &name,
                    &compiled,
                    collectors,
                    options,
                    &mut pre,
                    &mut post,
                    &mut saved_to,
                )
                .map_err(|e| e.to_string());

            if let Err(message) = &outcome {
                options.run.trace(format!("'{name}' failed: {message}"));
            }

            contexts.push(FamilyProcessingContext {
                family: name,
                run_id,
                started_at,
                outcome,
                elapsed: cycle_started.elapsed(),
                pre_snapshots: pre,
                post_snapshots: post,
                saved_to,
            });
        }

        (contexts, batch_started.elapsed())
    }

    /// Like [`OperationProcessor::process`], but re-throws the first captured
    /// document failure after all documents have been attempted.
    pub fn process_strict(
        &mut self,
        queue: &OperationQueue,
        collectors: &[Box<dyn SnapshotCollector>],
        options: &ProcessOptions,
    ) -> Result<(Vec<FamilyProcessingContext>, Duration), ProcessError> {
        let (contexts, elapsed) = self.process(queue, collectors, options);
        for ctx in &contexts {
            if let Err(message) = &ctx.outcome {
                return Err(ProcessError::DocumentFailed {
                    family: ctx.family.clone(),
                    message: message.clone(),
                });
            }
        }
        Ok((contexts, elapsed))
    }

    /// One source document, N derived outputs.
    ///
    /// For each spec, the source is opened fresh, the spec's queue runs
    /// against it, and the result is written under the spec's output name.
    /// Without an output directory the derived documents are discarded after
    /// each cycle; only the returned contexts (logs, snapshots) remain.
    pub fn process_variant_specs(
        &mut self,
        source: &str,
        specs: &[VariantSpec],
        collectors: &[Box<dyn SnapshotCollector>],
        options: &ProcessOptions,
    ) -> (Vec<FamilyProcessingContext>, Duration) {
        let batch_started = Instant::now();
        let mut contexts = Vec::with_capacity(specs.len());

        for spec in specs {
            options
                .run
                .progress(format!("deriving '{}' from '{source}'", spec.output_name));
            let run_id = Uuid::new_v4();
            let started_at = Utc::now();
            let cycle_started = Instant::now();

            spec.queue.reset_all_group_contexts();
            let compiled = spec.queue.compile(options.compile);
            let mut pre = SnapshotSet::default();
            let mut post = SnapshotSet::default();
            let mut saved_to = None;
            let outcome = self
                .run_cycle(
                    source,
                    &spec.output_name,
                    &compiled,
                    collectors,
                    options,
                    &mut pre,
                    &mut post,
                    &mut saved_to,
                )
                .map_err(|e| e.to_string());

            contexts.push(FamilyProcessingContext {
                family: spec.output_name.clone(),
                run_id,
                started_at,
                outcome,
                elapsed: cycle_started.elapsed(),
                pre_snapshots: pre,
                post_snapshots: post,
                saved_to,
            });
        }

        (contexts, batch_started.elapsed())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_cycle(
        &mut self,
        name: &str,
        save_stem: &str,
        compiled: &CompiledQueue,
        collectors: &[Box<dyn SnapshotCollector>],
        options: &ProcessOptions,
        pre: &mut SnapshotSet,
        post: &mut SnapshotSet,
        saved_to: &mut Option<PathBuf>,
    ) -> Result<Vec<OperationLog>, DocError> {
        let mut doc = self.host.open(name)?;
        match self.drive_cycle(
            doc.as_mut(),
            save_stem,
            compiled,
            collectors,
            options,
            pre,
            post,
            saved_to,
        ) {
            Ok(logs) => {
                doc.close()?;
                Ok(logs)
            }
            Err(e) => {
                // The document must not stay open (or mid-transaction) into
                // the next cycle; best effort, the original error wins.
                let _ = doc.rollback();
                let _ = doc.close();
                Err(e)
            }
        }
    }

    /// Everything between open and close. The caller owns cleanup.
    #[allow(clippy::too_many_arguments)]
    fn drive_cycle(
        &mut self,
        doc: &mut dyn Document,
        save_stem: &str,
        compiled: &CompiledQueue,
        collectors: &[Box<dyn SnapshotCollector>],
        options: &ProcessOptions,
        pre: &mut SnapshotSet,
        post: &mut SnapshotSet,
        saved_to: &mut Option<PathBuf>,
    ) -> Result<Vec<OperationLog>, DocError> {
        *pre = collect_snapshots(collectors, doc)?;

        let mut logs = Vec::new();
        if compiled.single_transaction {
            doc.begin_transaction("batch")?;
            for exe in &compiled.executables {
                logs.extend(exe.execute(doc, &options.run));
            }
            doc.commit()?;
        } else {
            for exe in &compiled.executables {
                doc.begin_transaction(&exe.meta().name)?;
                logs.extend(exe.execute(doc, &options.run));
                doc.commit()?;
            }
        }

        *post = collect_snapshots(collectors, doc)?;

        if let Some(dir) = &options.output_dir {
            let path = dir.join(format!("{save_stem}.json"));
            doc.save_as(&path, &options.save)?;
            self.host.load(&path)?;
            *saved_to = Some(path);
        }

        Ok(logs)
    }
}

fn collect_snapshots(
    collectors: &[Box<dyn SnapshotCollector>],
    doc: &dyn Document,
) -> Result<SnapshotSet, DocError> {
    let mut set = SnapshotSet::default();
    for collector in collectors {
        let started = Instant::now();
        let value = collector.collect(doc)?;
        let spent = started.elapsed();
        let digest = format!("sha256:{}", hex::encode(Sha256::digest(serde_json::to_vec(&value)?)));
        let key = collector.name().to_string();
        set.values.insert(key.clone(), value);
        set.digests.insert(key.clone(), digest);
        set.timings.insert(key, spent);
    }
    Ok(set)
}
