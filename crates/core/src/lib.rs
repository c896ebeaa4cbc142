// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! Core types for qodana-ci.
//!
//! This crate holds everything that is independent of the CI host:
//!
//! - [`args`] - builds the `qodana pull` / `qodana scan` argument vectors
//! - [`checksum`] - verifies downloaded packages against expected hashes
//! - [`process`] - runs the tool and reports its exit code
//! - [`cache`] and [`artifact`] - best-effort bridges to host storage
//! - [`pipeline`] - the run orchestration, written once against capability traits
//!
//! Host providers (GitHub Actions, Azure Pipelines) implement
//! [`inputs::InputProvider`], [`cache::CacheProvider`],
//! [`artifact::ArtifactProvider`] and [`host::RunnerHost`].

pub mod archive;
pub mod args;
pub mod artifact;
pub mod cache;
pub mod checksum;
pub mod context;
pub mod env;
mod error;
pub mod host;
pub mod inputs;
pub mod outcome;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod summary;

pub use error::{Error, Result};

/// Name of the analysis tool executable and package prefix.
pub const TOOL_NAME: &str = "qodana";
