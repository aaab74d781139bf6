//! Postgres driver backed by sqlx pools

mod rows;

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Either, Postgres};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::driver::{Connection, Driver, Pool};
use crate::error::{ConfigError, DriverError};
use crate::types::{BindParams, ExecutionRequest, ExecutionResult};

const DEFAULT_PORT: u16 = 5432;

/// Creates sqlx Postgres pools from [`DatabaseConfig`]
#[derive(Clone)]
pub struct PgDriver {
    connect_options: PgConnectOptions,
    pool_min: u32,
    pool_max: u32,
    pool_increment: u32,
    acquire_timeout: Duration,
    max_rows: usize,
}

impl PgDriver {
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let connect_string = config.connect_string.as_deref().unwrap_or_default();
        let mut connect_options = parse_connect_string(connect_string)?;
        if let Some(user) = &config.user {
            connect_options = connect_options.username(user);
        }
        if let Some(password) = &config.password {
            connect_options = connect_options.password(password);
        }

        Ok(Self {
            connect_options,
            pool_min: config.pool_min,
            pool_max: config.pool_max,
            pool_increment: config.pool_increment,
            acquire_timeout: Duration::from_secs(config.acquire_timeout_secs),
            max_rows: config.max_rows,
        })
    }
}

/// Accepts a `postgres://` URL or an easy-connect style `host[:port]/database`
fn parse_connect_string(connect_string: &str) -> Result<PgConnectOptions, ConfigError> {
    let connect_string = connect_string.trim();

    if connect_string.starts_with("postgres://") || connect_string.starts_with("postgresql://") {
        return PgConnectOptions::from_str(connect_string)
            .map_err(|e| ConfigError::Invalid(format!("invalid connect_string: {}", e)));
    }

    let (address, database) = match connect_string.split_once('/') {
        Some((address, database)) => (address, Some(database)),
        None => (connect_string, None),
    };
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                ConfigError::Invalid(format!("invalid port in connect_string: {}", port))
            })?;
            (host, port)
        }
        None => (address, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(ConfigError::Invalid(
            "connect_string is missing a host".to_string(),
        ));
    }

    let mut options = PgConnectOptions::new().host(host).port(port);
    if let Some(database) = database.filter(|d| !d.is_empty()) {
        options = options.database(database);
    }
    Ok(options)
}

#[async_trait]
impl Driver for PgDriver {
    type Pool = PgPoolHandle;

    async fn create_pool(&self) -> Result<PgPoolHandle, DriverError> {
        // sqlx grows the pool one connection at a time; pool_increment is
        // only reported.
        debug!(
            pool_min = self.pool_min,
            pool_max = self.pool_max,
            pool_increment = self.pool_increment,
            "Creating Postgres pool"
        );

        let pool = PgPoolOptions::new()
            .min_connections(self.pool_min)
            .max_connections(self.pool_max)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(self.connect_options.clone())
            .await?;

        Ok(PgPoolHandle {
            pool,
            max_rows: self.max_rows,
            in_use: InUseCounter::default(),
        })
    }
}

pub struct PgPoolHandle {
    pool: PgPool,
    max_rows: usize,
    in_use: InUseCounter,
}

/// Sessions handed out and not yet released
///
/// sqlx returns a dropped connection to its pool from a background task, so
/// the pool's own idle count lags behind `release`. This counter does not.
#[derive(Clone, Default)]
struct InUseCounter(Arc<AtomicUsize>);

impl InUseCounter {
    fn checkout(&self) -> Checkout {
        self.0.fetch_add(1, Ordering::SeqCst);
        Checkout(self.0.clone())
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Decrements the counter when the session is released or dropped
struct Checkout(Arc<AtomicUsize>);

impl Drop for Checkout {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Pool for PgPoolHandle {
    type Connection = PgSession;

    async fn acquire(&self) -> Result<PgSession, DriverError> {
        let conn = self.pool.acquire().await?;
        Ok(PgSession {
            conn,
            max_rows: self.max_rows,
            in_transaction: false,
            _checkout: self.in_use.checkout(),
        })
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.pool.close().await;
        Ok(())
    }

    fn connections_in_use(&self) -> usize {
        self.in_use.get()
    }
}

/// One checked-out Postgres connection
///
/// With `auto_commit` off, the statement runs inside a transaction that is
/// rolled back when the session is released.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
    max_rows: usize,
    in_transaction: bool,
    _checkout: Checkout,
}

#[async_trait]
impl Connection for PgSession {
    async fn execute(&mut self, request: &ExecutionRequest) -> Result<ExecutionResult, DriverError> {
        if !request.options.auto_commit && !self.in_transaction {
            sqlx::query("BEGIN").execute(&mut *self.conn).await?;
            self.in_transaction = true;
        }

        let query = bind_params(sqlx::query(&request.statement), &request.params)?;
        let max_rows = row_limit(request.options.max_rows, self.max_rows);

        let mut result = ExecutionResult::default();
        let mut stream = query.fetch_many(&mut *self.conn);
        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => result.rows_affected += done.rows_affected(),
                Either::Right(row) => {
                    if result.columns.is_empty() {
                        result.columns = rows::column_names(&row);
                    }
                    // Keep draining past the cap so the connection goes back clean
                    if result.rows.len() < max_rows {
                        result.rows.push(rows::render(&row, request.options.result_shape)?);
                    }
                }
            }
        }

        Ok(result)
    }

    async fn release(mut self) -> Result<(), DriverError> {
        if self.in_transaction {
            if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *self.conn).await {
                if let Err(close_error) = self.conn.close().await {
                    warn!(error = %close_error, "Failed to close connection after rollback failure");
                }
                return Err(e.into());
            }
        }
        drop(self.conn);
        Ok(())
    }
}

/// Rows kept per statement; 0 means no limit
fn row_limit(requested: Option<usize>, default: usize) -> usize {
    match requested.unwrap_or(default) {
        0 => usize::MAX,
        limit => limit,
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q BindParams,
) -> Result<Query<'q, Postgres, PgArguments>, DriverError> {
    match params {
        BindParams::Positional(values) => {
            for value in values {
                query = bind_value(query, value);
            }
            Ok(query)
        }
        BindParams::Named(values) if values.is_empty() => Ok(query),
        BindParams::Named(_) => Err(DriverError::Unsupported(
            "named bind parameters; use positional $1, $2, ... placeholders".to_string(),
        )),
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &'q JsonValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        JsonValue::String(s) => query.bind(s.as_str()),
        JsonValue::Array(_) | JsonValue::Object(_) => query.bind(sqlx::types::Json(value)),
    }
}
