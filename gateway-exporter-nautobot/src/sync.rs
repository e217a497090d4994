//! Idempotent interface status upsert against the inventory.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::inventory::{InventoryClient, InventoryError, SyncPayload};

/// Outcome of a failed synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The record did not exist. A create was attempted; `created` says
    /// whether it succeeded. The original failure is still reported.
    #[error("Interface not found in inventory: {message}")]
    NotFound { message: String, created: bool },

    /// Any other inventory failure. No create was attempted.
    #[error(transparent)]
    Inventory(InventoryError),

    /// The attempt (update plus optional create) did not finish in time.
    #[error("Inventory synchronization timed out after {0:?}")]
    Timeout(Duration),
}

/// Upserts interface status records: update, else create.
#[derive(Clone)]
pub struct Synchronizer {
    client: Arc<dyn InventoryClient>,
    timeout: Duration,
}

impl Synchronizer {
    pub fn new(client: Arc<dyn InventoryClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Push one interface's status to the inventory.
    ///
    /// `Ok(())` means the existing record was updated. A not-found update
    /// triggers a create of the same payload, but still yields
    /// `SyncError::NotFound`.
    pub async fn sync_interface_status(
        &self,
        payload: &SyncPayload,
        endpoint: &str,
    ) -> Result<(), SyncError> {
        tokio::time::timeout(self.timeout, self.upsert(payload, endpoint))
            .await
            .map_err(|_| SyncError::Timeout(self.timeout))?
    }

    async fn upsert(&self, payload: &SyncPayload, endpoint: &str) -> Result<(), SyncError> {
        let message = match self.client.patch_interface_status(endpoint, payload).await {
            Ok(_) => {
                info!(endpoint, "Interface updated in inventory");
                return Ok(());
            }
            Err(InventoryError::NotFound { message }) => message,
            Err(err) => return Err(SyncError::Inventory(err)),
        };

        debug!(endpoint, "Interface does not exist in inventory, creating it");
        let created = match self
            .client
            .post_interfaces_status(std::slice::from_ref(payload))
            .await
        {
            Ok(_) => {
                info!(endpoint, "Interface created in inventory");
                true
            }
            Err(e) => {
                warn!(endpoint, error = %e, "Could not create interface in inventory");
                false
            }
        };

        Err(SyncError::NotFound { message, created })
    }
}
