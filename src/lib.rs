//! Famforge - batch processor for parametric CAD family documents
//!
//! Famforge applies an ordered, configurable set of transformation operations
//! to each document in a batch, at two granularities: once per document and
//! once per named variant ("type") defined inside the document.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Queue compilation, merged variant sweeps, the processor pipeline
//! - [`core`] - Domain types, parameter models, dependency sorting, configuration
//! - [`doc`] - Single interface for all document backend operations
//! - [`coerce`] - Pluggable value coercion strategies and their registry
//! - [`ops`] - Built-in operations over the engine's operation traits
//!
//! # Correctness Invariants
//!
//! Famforge maintains the following invariants:
//!
//! 1. All document mutation flows through the [`doc::Document`] seam
//! 2. A failing operation never aborts the queue; failures are recorded per entry
//! 3. Log entries transition to a terminal status exactly once
//! 4. Parameter assignments are applied in formula-dependency order, never partially
//!    under a cycle

pub mod cli;
pub mod coerce;
pub mod core;
pub mod doc;
pub mod engine;
pub mod ops;
