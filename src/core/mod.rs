//! core
//!
//! Core domain types and supporting machinery for famforge.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ParameterName, VariantName, ParamValue, etc.
//! - [`params`] - Parameter definitions and assignment request models
//! - [`deps`] - Dependency extraction and topological sorting of requests
//! - [`config`] - Run configuration schema and loading
//! - [`lock`] - Session locking against concurrent batch runs
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Sorting and validation are deterministic

pub mod config;
pub mod deps;
pub mod lock;
pub mod params;
pub mod types;
