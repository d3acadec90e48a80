//! CLI output formatting
//!
//! Human-readable, colored progress for pipeline runs.

pub mod display;
