//! Scheduler layer for the runner
//!
//! Drives the polling cycle: compute the pending set, dispatch it to a
//! bounded pool of tool runs, drain the pool, sleep. Shutdown is observed
//! only at the sleep boundary, so in-flight runs always complete.

pub mod poller;

pub use poller::Poller;
