pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod helper;
pub mod pool;
pub mod postgres;
pub mod types;

#[cfg(test)]
pub mod test_helpers;

// Re-export main types
pub use types::*;

pub use error::{ConfigError, DriverError, ErrorKind, OperationError, Result};
pub use helper::SqlHelper;
pub use pool::PoolManager;
pub use postgres::PgDriver;
