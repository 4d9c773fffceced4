//! Download and upload concurrency gates

use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Two independent permit pools shared by every transfer
///
/// Capacities are fixed at construction. Permits are owned and released on
/// drop, so every exit path (success, failure, cancellation, panic) gives the
/// slot back.
#[derive(Clone, Debug)]
pub struct ConcurrencyGates {
    download: Arc<Semaphore>,
    upload: Arc<Semaphore>,
    download_capacity: usize,
    upload_capacity: usize,
}

impl ConcurrencyGates {
    /// Create gates with the given capacities
    pub fn new(max_downloads: usize, max_uploads: usize) -> Self {
        Self {
            download: Arc::new(Semaphore::new(max_downloads)),
            upload: Arc::new(Semaphore::new(max_uploads)),
            download_capacity: max_downloads,
            upload_capacity: max_uploads,
        }
    }

    /// Wait for a download slot unless `cancel` fires first
    pub async fn acquire_download(&self, cancel: &CancellationToken) -> Result<OwnedSemaphorePermit> {
        acquire(&self.download, cancel).await
    }

    /// Wait for an upload slot unless `cancel` fires first
    pub async fn acquire_upload(&self, cancel: &CancellationToken) -> Result<OwnedSemaphorePermit> {
        acquire(&self.upload, cancel).await
    }

    /// Download slots currently free
    pub fn available_downloads(&self) -> usize {
        self.download.available_permits()
    }

    /// Upload slots currently free
    pub fn available_uploads(&self) -> usize {
        self.upload.available_permits()
    }

    /// Configured download capacity
    pub fn download_capacity(&self) -> usize {
        self.download_capacity
    }

    /// Configured upload capacity
    pub fn upload_capacity(&self) -> usize {
        self.upload_capacity
    }

    /// Whether no permit of either gate is currently held
    pub fn is_idle(&self) -> bool {
        self.available_downloads() == self.download_capacity
            && self.available_uploads() == self.upload_capacity
    }
}

async fn acquire(gate: &Arc<Semaphore>, cancel: &CancellationToken) -> Result<OwnedSemaphorePermit> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        permit = gate.clone().acquire_owned() => {
            permit.map_err(|_| Error::Other("concurrency gate closed".to_string()))
        }
    }
}
