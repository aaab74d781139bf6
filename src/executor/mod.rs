//! Auto-releasing statement execution
//!
//! `run` acquires a connection, executes one request, and always releases the
//! connection afterwards. Which outcome reaches the caller when execute and
//! release each succeed or fail is decided by `settle`:
//!
//! | execute  | release | caller receives                          |
//! |----------|---------|------------------------------------------|
//! | `Ok(r)`  | `Ok`    | `Ok(r)`                                  |
//! | `Ok(r)`  | `Err(x)`| `Ok(r)`, `x` logged                      |
//! | `Err(e)` | `Ok`    | `Execution(e)`                           |
//! | `Err(e)` | `Err(x)`| `Execution(e)` with `x` as `suppressed`  |

mod guard;

use tracing::{debug, error, warn, Instrument};
use uuid::Uuid;

use crate::driver::Pool;
use crate::error::{DriverError, OperationError, Result};
use crate::types::{ExecutionRequest, ExecutionResult};

use guard::ReleaseGuard;

/// Run a single request on a connection from `pool`
///
/// Acquisition failures return `ConnectionAcquisition` and nothing is
/// released. Once a connection is held, release runs after the execute
/// attempt on every path, including cancellation of this future.
pub async fn run<P: Pool>(pool: &P, request: &ExecutionRequest) -> Result<ExecutionResult> {
    let operation_id = Uuid::new_v4();
    let span = tracing::debug_span!("run", %operation_id);

    async move {
        let connection = pool.acquire().await.map_err(|e| {
            error!(error = %e, "Failed to get connection");
            OperationError::ConnectionAcquisition(e)
        })?;
        let mut guard = ReleaseGuard::new(connection, operation_id);

        let executed = guard.execute(request).await;
        match &executed {
            Ok(result) => debug!(rows = result.rows.len(), "Success executing sql"),
            Err(e) => error!(error = %e, "Failed to execute sql"),
        }

        let released = guard.release().await;
        if released.is_ok() {
            debug!("Released connection");
        }

        settle(executed, released)
    }
    .instrument(span)
    .await
}

/// Pick the caller-visible outcome of an execute/release pair
///
/// A result that was produced is never discarded because of a release
/// failure, and a release failure never masks an execution failure.
pub fn settle<T>(
    executed: std::result::Result<T, DriverError>,
    released: std::result::Result<(), DriverError>,
) -> Result<T> {
    match (executed, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(value), Err(release_error)) => {
            discard_release_failure(release_error);
            Ok(value)
        }
        (Err(source), Ok(())) => Err(OperationError::Execution {
            source,
            suppressed: None,
        }),
        (Err(source), Err(release_error)) => {
            warn!(error = %release_error, "Failed to release connection after execution error");
            Err(OperationError::Execution {
                source,
                suppressed: Some(release_error),
            })
        }
    }
}

/// Report a release failure that never reaches the caller
fn discard_release_failure(error: DriverError) {
    let error = OperationError::Release(error);
    warn!(error = %error, kind = ?error.kind(), "Failed to release connection");
}
