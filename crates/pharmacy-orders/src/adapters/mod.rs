//! # Port Adapters
//!
//! - [`sqlite`] - Binds the ports to `pharmacy-db` repositories
//! - [`memory`] - Process-local stores with failure injection

pub mod memory;
pub mod sqlite;
