//! Core domain types
//!
//! This module contains the domain structures shared across capstan crates.
//! They are deliberately small: the catalog hands out opaque identifiers and
//! the runner reports per-run outcomes against them.

pub mod job;
