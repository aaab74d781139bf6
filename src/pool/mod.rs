//! Shared pool lifecycle
//!
//! One `PoolManager` owns at most one pool. The pool is created lazily on the
//! first `ensure_pool` call and reused until `teardown_pool`. Concurrent first
//! callers share a single creation future, so the driver's `create_pool` runs
//! once per lifetime and every waiter sees the same pool or the same error.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::driver::{Driver, Pool};
use crate::error::{DriverError, OperationError, Result};

type Creation<P> = std::result::Result<Arc<P>, Arc<DriverError>>;
type Flight<P> = Shared<BoxFuture<'static, Creation<P>>>;

enum PoolState<P> {
    Absent,
    Creating { generation: u64, flight: Flight<P> },
    Present(Arc<P>),
}

struct Inner<P> {
    state: PoolState<P>,
    /// Bumped for every creation attempt so a stale flight never overwrites
    /// the state of a newer one.
    generation: u64,
}

/// Owns the single shared pool of a helper instance
pub struct PoolManager<D: Driver> {
    driver: Arc<D>,
    inner: Mutex<Inner<D::Pool>>,
}

impl<D: Driver> PoolManager<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver: Arc::new(driver),
            inner: Mutex::new(Inner {
                state: PoolState::Absent,
                generation: 0,
            }),
        }
    }

    /// Get or create the shared pool
    ///
    /// Returns the cached pool when one exists. Otherwise starts (or joins) a
    /// creation. On failure the pool stays absent so a later call can retry.
    pub async fn ensure_pool(&self) -> Result<Arc<D::Pool>> {
        let (generation, flight) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;

            match &inner.state {
                PoolState::Present(pool) => {
                    debug!("Pool already exists");
                    return Ok(pool.clone());
                }
                PoolState::Creating { generation, flight } => {
                    debug!(generation, "Pool creation already in progress");
                    (*generation, flight.clone())
                }
                PoolState::Absent => {
                    debug!("Pool does not exist");
                    inner.generation += 1;
                    let generation = inner.generation;
                    let flight = self.start_creation(generation);
                    inner.state = PoolState::Creating {
                        generation,
                        flight: flight.clone(),
                    };
                    (generation, flight)
                }
            }
        };

        let outcome = flight.await;
        self.settle_creation(generation, &outcome).await;
        outcome.map_err(OperationError::PoolCreation)
    }

    fn start_creation(&self, generation: u64) -> Flight<D::Pool> {
        let driver = self.driver.clone();

        async move {
            match driver.create_pool().await {
                Ok(pool) => {
                    debug!(generation, "Pool created");
                    Ok(Arc::new(pool))
                }
                Err(e) => {
                    error!(generation, error = %e, "Failed to create pool");
                    Err(Arc::new(e))
                }
            }
        }
        .boxed()
        .shared()
    }

    async fn settle_creation(&self, generation: u64, outcome: &Creation<D::Pool>) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let current = match &inner.state {
            PoolState::Creating { generation, .. } => *generation,
            _ => return,
        };
        if current != generation {
            return;
        }

        inner.state = match outcome {
            Ok(pool) => PoolState::Present(pool.clone()),
            Err(_) => PoolState::Absent,
        };
    }

    /// Close the shared pool, if any
    ///
    /// The cached reference is cleared whether or not the close succeeds; a
    /// failed close is not retried. A creation still in progress is awaited
    /// and its pool closed.
    pub async fn teardown_pool(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;

        let pool = match std::mem::replace(&mut guard.state, PoolState::Absent) {
            PoolState::Absent => {
                debug!("No pool to tear down");
                return Ok(());
            }
            PoolState::Present(pool) => pool,
            PoolState::Creating { flight, .. } => match flight.await {
                Ok(pool) => pool,
                Err(_) => return Ok(()),
            },
        };

        match pool.close().await {
            Ok(()) => {
                debug!("Pool closed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to destroy pool");
                Err(OperationError::PoolTeardown(e))
            }
        }
    }

    /// The cached pool, without creating one
    pub async fn current_pool(&self) -> Option<Arc<D::Pool>> {
        match &self.inner.lock().await.state {
            PoolState::Present(pool) => Some(pool.clone()),
            _ => None,
        }
    }
}
