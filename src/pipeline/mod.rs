//! Pipeline execution engine
//!
//! Definitions, prompt building, the scratch workspace, the per-step state
//! machine and the runner that sequences steps.

pub mod context;
pub mod definition;
pub mod prompt;
pub mod runner;
pub mod step;
pub mod workspace;
