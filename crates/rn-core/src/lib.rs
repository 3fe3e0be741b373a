//! # rn-core
//!
//! Core types, traits, and error definitions for reachnet-rs.
//!
//! This crate provides the foundational building blocks shared across all
//! other crates in the workspace – type aliases, the error hierarchy, the
//! `AnalysisConfig` value, the cancellation token, and the diagnostics
//! record returned alongside analysis results.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Node identifier: a dense integer in `1..=node_count`.
pub type NodeId = usize;

/// A directed edge `(u, v)` with `u ≠ v`.
pub type Edge = (NodeId, NodeId);

/// Alias used for array sizes / indices.
pub type Size = usize;

pub mod config;
pub mod diagnostics;
pub mod errors;

pub use config::{AnalysisConfig, CancellationToken};
pub use diagnostics::Diagnostics;
pub use errors::{Error, Result};
