//! Adapter implementations of the port traits.

pub mod csv_adapter;
pub mod csv_result_adapter;
pub mod file_config_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
