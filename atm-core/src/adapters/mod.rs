//! Adapters - concrete implementations of ports
//!
//! Adapters implement the port traits defined in the ports module.

pub mod duckdb;

pub use self::duckdb::DuckDbRepository;
