//! Logging and observability
//!
//! JSONL history of finished runs.

pub mod jsonl;

pub use jsonl::{RunLogger, RunRecord, StepRecord};
