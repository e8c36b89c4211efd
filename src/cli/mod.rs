//! cli
//!
//! Command-line interface layer for famforge.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Wire configuration, registry, host, and processor together
//! - Does NOT perform document mutations directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, builds the queue
//! from the run configuration, and hands everything to
//! [`crate::engine::OperationProcessor`]. All document state changes flow
//! through the engine.

pub mod args;
pub mod output;

pub use args::{Cli, Command};

use anyhow::{bail, Context as _, Result};

use crate::coerce::CoercionRegistry;
use crate::core::config::RunConfig;
use crate::core::lock::SessionLock;
use crate::doc::JsonHost;
use crate::engine::processor::{OperationProcessor, ParameterValueCollector, SnapshotCollector};
use crate::engine::RunContext;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let run_ctx = RunContext {
        debug: cli.debug,
        quiet: cli.quiet,
    };

    match cli.command {
        Command::Run { config, dir, strict } => {
            let config = RunConfig::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            let registry = CoercionRegistry::with_builtins();

            let _lock = SessionLock::acquire(&dir)
                .with_context(|| format!("locking session {}", dir.display()))?;

            let mut processor = OperationProcessor::new(JsonHost::new(&dir));
            if config.run.documents.is_empty() {
                if processor.select_all() == 0 {
                    bail!("no documents found in {}", dir.display());
                }
            } else {
                processor.select(&config.run.documents)?;
            }

            let mut options = config.process_options();
            options.run = run_ctx;
            let collectors: Vec<Box<dyn SnapshotCollector>> =
                vec![Box::new(ParameterValueCollector)];
            let queue = config.build_queue(&registry)?;

            let (contexts, total) = if strict {
                processor.process_strict(&queue, &collectors, &options)?
            } else {
                processor.process(&queue, &collectors, &options)
            };

            print!("{}", output::render_batch(&contexts, total, cli.quiet));
            if contexts.iter().any(|c| c.has_errors()) {
                bail!("one or more documents had errors");
            }
            Ok(())
        }

        Command::Inspect { config } => {
            let config = RunConfig::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            let registry = CoercionRegistry::with_builtins();
            let options = config.process_options();
            let queue = config.build_queue(&registry)?;
            let compiled = queue.compile(options.compile);

            if compiled.executables.is_empty() {
                run_ctx.progress("nothing to execute");
            } else {
                print!("{}", output::render_plan(&compiled.metadata()));
            }
            Ok(())
        }
    }
}
