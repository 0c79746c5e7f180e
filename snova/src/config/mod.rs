//! Installation and site configuration

pub mod installation;
pub mod site;
pub mod store;
