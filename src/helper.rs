//! Top-level helper: pool lifecycle plus auto-releasing execution
//!
//! # Example
//!
//! ```ignore
//! use sqlhelper::SqlHelper;
//!
//! let helper = SqlHelper::from_env()?;
//! let result = helper.simple_execute("select 'foo' as foo", None, None).await?;
//! assert_eq!(result.rows[0]["foo"], "foo");
//! helper.destroy_pool().await?;
//! ```

use std::sync::Arc;

use futures::future::join_all;

use crate::config::{Config, DatabaseConfig};
use crate::driver::Driver;
use crate::error::{ConfigError, Result};
use crate::executor;
use crate::pool::PoolManager;
use crate::postgres::PgDriver;
use crate::types::{BindParams, ExecuteOptions, ExecutionRequest, ExecutionResult};

/// Runs statements against a lazily created, shared pool
pub struct SqlHelper<D: Driver> {
    pools: PoolManager<D>,
}

impl<D: Driver> SqlHelper<D> {
    pub fn new(driver: D) -> Self {
        Self {
            pools: PoolManager::new(driver),
        }
    }

    /// Run one statement, filling in defaults for anything omitted
    ///
    /// Missing bind parameters become an empty positional set; missing
    /// options become row objects with auto-commit on.
    pub async fn simple_execute(
        &self,
        statement: &str,
        params: Option<BindParams>,
        options: Option<ExecuteOptions>,
    ) -> Result<ExecutionResult> {
        let request = ExecutionRequest {
            statement: statement.to_string(),
            params: params.unwrap_or_default(),
            options: options.unwrap_or_default(),
        };
        self.execute(&request).await
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let pool = self.pools.ensure_pool().await?;
        executor::run(pool.as_ref(), request).await
    }

    /// Run several requests concurrently on the shared pool
    ///
    /// Every request runs to completion, so all connections are released
    /// before this returns. Yields the results in input order, or the first
    /// error in input order.
    pub async fn execute_all(&self, requests: &[ExecutionRequest]) -> Result<Vec<ExecutionResult>> {
        join_all(requests.iter().map(|request| self.execute(request)))
            .await
            .into_iter()
            .collect()
    }

    pub async fn create_pool(&self) -> Result<Arc<D::Pool>> {
        self.pools.ensure_pool().await
    }

    pub async fn destroy_pool(&self) -> Result<()> {
        self.pools.teardown_pool().await
    }

    /// The current pool, if one has been created
    pub async fn pool(&self) -> Option<Arc<D::Pool>> {
        self.pools.current_pool().await
    }
}

impl SqlHelper<PgDriver> {
    /// Postgres-backed helper from explicit database settings
    pub fn from_config(config: &DatabaseConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(PgDriver::from_config(config)?))
    }

    /// Postgres-backed helper from the layered configuration (file, `.env`,
    /// environment)
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let config = Config::load()?;
        Self::from_config(&config.database)
    }
}
