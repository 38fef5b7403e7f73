//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod create_synthesis;
pub mod run_collaboration;
