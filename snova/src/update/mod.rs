//! Update pipeline

pub mod orchestrator;
pub mod plan;
pub mod prompt;
pub mod stage;
pub mod steps;
pub mod version;
