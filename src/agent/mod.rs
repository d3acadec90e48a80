//! External agent integration
//!
//! This module handles permission resolution, command building and running
//! the agent process for a step.

pub mod cli;
pub mod invoker;
pub mod permissions;
