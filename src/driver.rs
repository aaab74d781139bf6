//! Driver seam
//!
//! The pool manager and executor only talk to the database through these
//! traits. A driver supplies a pool factory, the pool hands out connections,
//! and each connection runs statements and is released back exactly once.

use async_trait::async_trait;

use crate::error::DriverError;
use crate::types::{ExecutionRequest, ExecutionResult};

/// Factory for pools of a particular database client library
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Pool: Pool;

    /// Create a new pool. Called at most once per pool lifetime by the
    /// pool manager.
    async fn create_pool(&self) -> Result<Self::Pool, DriverError>;
}

/// A shared pool of database connections
#[async_trait]
pub trait Pool: Send + Sync + 'static {
    type Connection: Connection;

    /// Check out a connection
    async fn acquire(&self) -> Result<Self::Connection, DriverError>;

    /// Close the pool, waiting for its connections to be released
    async fn close(&self) -> Result<(), DriverError>;

    /// Number of connections currently checked out
    fn connections_in_use(&self) -> usize;
}

/// A connection checked out from a [`Pool`]
#[async_trait]
pub trait Connection: Send + 'static {
    async fn execute(&mut self, request: &ExecutionRequest) -> Result<ExecutionResult, DriverError>;

    /// Hand the connection back to its pool
    async fn release(self) -> Result<(), DriverError>;
}
