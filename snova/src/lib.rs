//! Snova Library
//!
//! Core modules of snova, the manager of multi-tenant Sparrow installations:
//! update orchestration, site domain reconciliation, process-manager restart
//! resolution and config persistence.

pub mod apps;
pub mod cli;
pub mod config;
pub mod context;
pub mod domains;
pub mod env;
pub mod errors;
pub mod exec;
pub mod filesys;
pub mod logs;
pub mod patches;
pub mod procman;
pub mod storage;
pub mod update;
pub mod utils;
