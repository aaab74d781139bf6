//! Test helpers: an in-memory driver that records every call
//!
//! Behaviour is configured up front on a `MockDriver` and observed through the
//! shared `MockStats` handle after the driver has been moved into a manager.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::driver::{Connection, Driver, Pool};
use crate::error::DriverError;
use crate::types::{ExecutionRequest, ExecutionResult};

type ExecuteFn = dyn Fn(&ExecutionRequest) -> Result<ExecutionResult, DriverError> + Send + Sync;

/// Counters and recorded requests shared between the test and the driver
#[derive(Default)]
pub struct MockStats {
    pub pools_created: AtomicUsize,
    pub pools_closed: AtomicUsize,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub in_use: AtomicUsize,
    pub executed: Mutex<Vec<ExecutionRequest>>,
}

impl MockStats {
    pub fn pools_created(&self) -> usize {
        self.pools_created.load(Ordering::SeqCst)
    }

    pub fn pools_closed(&self) -> usize {
        self.pools_closed.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<ExecutionRequest> {
        self.executed.lock().unwrap().clone()
    }
}

/// Rows returned by the default execute behaviour
pub fn foo_result() -> ExecutionResult {
    ExecutionResult {
        columns: vec!["FOO".to_string()],
        rows: vec![json!({"FOO": "foo"})],
        rows_affected: 0,
    }
}

struct Behaviour {
    create_error: Option<String>,
    create_delay: Duration,
    acquire_error: Option<String>,
    close_error: Option<String>,
    release_error: Option<String>,
    execute_delay: Duration,
    execute: Arc<ExecuteFn>,
}

pub struct MockDriver {
    behaviour: Arc<Behaviour>,
    stats: Arc<MockStats>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            behaviour: Arc::new(Behaviour {
                create_error: None,
                create_delay: Duration::ZERO,
                acquire_error: None,
                close_error: None,
                release_error: None,
                execute_delay: Duration::ZERO,
                execute: Arc::new(|_| Ok(foo_result())),
            }),
            stats: Arc::new(MockStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }

    fn behaviour_mut(&mut self) -> &mut Behaviour {
        Arc::get_mut(&mut self.behaviour).expect("configure the mock before sharing it")
    }

    pub fn fail_create(mut self, message: &str) -> Self {
        self.behaviour_mut().create_error = Some(message.to_string());
        self
    }

    pub fn create_delay(mut self, delay: Duration) -> Self {
        self.behaviour_mut().create_delay = delay;
        self
    }

    pub fn fail_acquire(mut self, message: &str) -> Self {
        self.behaviour_mut().acquire_error = Some(message.to_string());
        self
    }

    pub fn fail_close(mut self, message: &str) -> Self {
        self.behaviour_mut().close_error = Some(message.to_string());
        self
    }

    pub fn fail_release(mut self, message: &str) -> Self {
        self.behaviour_mut().release_error = Some(message.to_string());
        self
    }

    pub fn execute_delay(mut self, delay: Duration) -> Self {
        self.behaviour_mut().execute_delay = delay;
        self
    }

    pub fn fail_execute(self, message: &str) -> Self {
        let message = message.to_string();
        self.on_execute(move |_| Err(DriverError::other(message.clone())))
    }

    pub fn on_execute<F>(mut self, execute: F) -> Self
    where
        F: Fn(&ExecutionRequest) -> Result<ExecutionResult, DriverError> + Send + Sync + 'static,
    {
        self.behaviour_mut().execute = Arc::new(execute);
        self
    }
}

#[async_trait]
impl Driver for MockDriver {
    type Pool = MockPool;

    async fn create_pool(&self) -> Result<MockPool, DriverError> {
        self.stats.pools_created.fetch_add(1, Ordering::SeqCst);

        if !self.behaviour.create_delay.is_zero() {
            tokio::time::sleep(self.behaviour.create_delay).await;
        }
        if let Some(message) = &self.behaviour.create_error {
            return Err(DriverError::other(message.clone()));
        }

        Ok(MockPool {
            id: self.stats.pools_created(),
            behaviour: self.behaviour.clone(),
            stats: self.stats.clone(),
        })
    }
}

pub struct MockPool {
    pub id: usize,
    behaviour: Arc<Behaviour>,
    stats: Arc<MockStats>,
}

impl std::fmt::Debug for MockPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPool").field("id", &self.id).finish()
    }
}

#[async_trait]
impl Pool for MockPool {
    type Connection = MockConnection;

    async fn acquire(&self) -> Result<MockConnection, DriverError> {
        if let Some(message) = &self.behaviour.acquire_error {
            return Err(DriverError::other(message.clone()));
        }

        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        self.stats.in_use.fetch_add(1, Ordering::SeqCst);

        Ok(MockConnection {
            behaviour: self.behaviour.clone(),
            stats: self.stats.clone(),
        })
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.stats.pools_closed.fetch_add(1, Ordering::SeqCst);

        match &self.behaviour.close_error {
            Some(message) => Err(DriverError::other(message.clone())),
            None => Ok(()),
        }
    }

    fn connections_in_use(&self) -> usize {
        self.stats.in_use()
    }
}

pub struct MockConnection {
    behaviour: Arc<Behaviour>,
    stats: Arc<MockStats>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, request: &ExecutionRequest) -> Result<ExecutionResult, DriverError> {
        self.stats.executed.lock().unwrap().push(request.clone());

        if !self.behaviour.execute_delay.is_zero() {
            tokio::time::sleep(self.behaviour.execute_delay).await;
        }

        (self.behaviour.execute)(request)
    }

    async fn release(self) -> Result<(), DriverError> {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        self.stats.in_use.fetch_sub(1, Ordering::SeqCst);

        match &self.behaviour.release_error {
            Some(message) => Err(DriverError::other(message.clone())),
            None => Ok(()),
        }
    }
}
