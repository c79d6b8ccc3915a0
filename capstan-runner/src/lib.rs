//! Capstan Runner
//!
//! A long-running scheduler that polls a work catalog for job identifiers,
//! skips the ones already recorded in a shared tracking file, and fans the
//! rest out to bounded-parallel external tool runs.
//!
//! Architecture:
//! - Configuration: environment-driven settings, defaults for everything
//! - State: advisory-locked tracking file of already-dispatched jobs
//! - Dedup: candidate set minus tracked keys, with bounded lock retries
//! - Executor: subprocess tool runs with captured diagnostics
//! - Scheduler: poll loop with bounded dispatch and graceful shutdown

pub mod config;
pub mod dedup;
pub mod executor;
pub mod scheduler;
pub mod state;
