//! Scoped release of a checked-out connection

use tracing::{debug, warn, Instrument};
use uuid::Uuid;

use crate::driver::Connection;
use crate::error::DriverError;
use crate::types::{ExecutionRequest, ExecutionResult};

/// Owns a connection for the length of one operation
///
/// `release` hands the connection back and reports the outcome. If the guard
/// is dropped first (the operation future was cancelled), the release is
/// spawned onto the current tokio runtime instead.
pub(crate) struct ReleaseGuard<C: Connection> {
    connection: Option<C>,
    operation_id: Uuid,
}

impl<C: Connection> ReleaseGuard<C> {
    pub(crate) fn new(connection: C, operation_id: Uuid) -> Self {
        Self {
            connection: Some(connection),
            operation_id,
        }
    }

    pub(crate) async fn execute(
        &mut self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, DriverError> {
        match self.connection.as_mut() {
            Some(connection) => connection.execute(request).await,
            None => Err(DriverError::other("connection already released")),
        }
    }

    pub(crate) async fn release(mut self) -> Result<(), DriverError> {
        match self.connection.take() {
            Some(connection) => connection.release().await,
            None => Ok(()),
        }
    }
}

impl<C: Connection> Drop for ReleaseGuard<C> {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        let operation_id = self.operation_id;

        // Only spawn if a tokio runtime is still available
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(%operation_id, "Operation cancelled, releasing connection in background");
                handle.spawn(
                    async move {
                        if let Err(e) = connection.release().await {
                            super::discard_release_failure(e);
                        }
                    }
                    .instrument(tracing::debug_span!("release", %operation_id)),
                );
            }
            Err(_) => {
                warn!(
                    %operation_id,
                    "Tokio runtime unavailable, connection dropped without release"
                );
            }
        }
    }
}
