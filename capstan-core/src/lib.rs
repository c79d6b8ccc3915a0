//! Capstan Core
//!
//! Core types for the capstan scheduler.
//!
//! This crate contains:
//! - Domain types: job identifiers and per-run results shared between the
//!   catalog client and the runner

pub mod domain;

pub use domain::job::{CycleSummary, JobId, RunResult};
