//! Installation storage

pub mod layout;
pub mod settings;
