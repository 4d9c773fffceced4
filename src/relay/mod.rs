//! Core relay implementation split into focused submodules.
//!
//! The `Relay` struct and its methods are organized by domain:
//! - [`single`] - Single post entry point (links and resolved messages)
//! - [`batch`] - Range runs over consecutive message ids
//! - [`control`] - Cancellation and task introspection
//! - [`lifecycle`] - Shutdown coordination
//! - [`transfer`] - Per-unit download/upload state machine and media groups
//! - [`gates`] - Download and upload concurrency limits
//! - [`registry`] - In-flight task tracking

mod batch;
mod control;
pub mod gates;
mod lifecycle;
pub mod registry;
mod single;
pub(crate) mod transfer;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use gates::ConcurrencyGates;
pub use registry::{TaskGuard, TaskHandle, TaskRegistry};

use crate::client::MessagingClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::media::MediaProbe;
use crate::types::{ChatId, Event};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{OnceCell, broadcast};
use transfer::TransferContext;

/// Event channel capacity; slower subscribers see `RecvError::Lagged`
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main relay instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Relay {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Messaging platform client
    pub(crate) client: Arc<dyn MessagingClient>,
    /// Media probe for upload metadata and thumbnails
    pub(crate) probe: Arc<dyn MediaProbe>,
    /// Download and upload permit pools
    pub(crate) gates: ConcurrencyGates,
    /// Handles of in-flight single transfers, range runs and range jobs
    pub(crate) registry: TaskRegistry,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Flag to indicate whether new submissions are accepted (false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Premium status of the client account, fetched once
    pub(crate) premium: Arc<OnceCell<bool>>,
}

impl Relay {
    /// Create a new relay
    ///
    /// Validates the configuration and sizes the concurrency gates from it.
    /// The download directory is created on demand by the first transfer.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_relay::{Config, Relay, media};
    /// use media_relay::client::MessagingClient;
    /// use std::sync::Arc;
    ///
    /// # fn example(client: Arc<dyn MessagingClient>) -> media_relay::Result<()> {
    /// let config = Config::from_env()?;
    /// let probe = media::probe_from_config(&config);
    /// let relay = Relay::new(config, client, probe)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        config: Config,
        client: Arc<dyn MessagingClient>,
        probe: Arc<dyn MediaProbe>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let gates =
            ConcurrencyGates::new(config.max_concurrent_downloads, config.max_concurrent_uploads);

        tracing::info!(
            max_concurrent_downloads = config.max_concurrent_downloads,
            max_concurrent_uploads = config.max_concurrent_uploads,
            batch_size = config.batch_size,
            media_probe = probe.name(),
            "relay initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            client,
            probe,
            gates,
            registry: TaskRegistry::new(),
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
            premium: Arc::new(OnceCell::new()),
        })
    }

    /// Subscribe to relay events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. A subscriber that falls behind by more than 1000 events
    /// receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Shared concurrency gates, for inspecting permit usage
    pub fn gates(&self) -> &ConcurrencyGates {
        &self.gates
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    /// Everything one task needs to run transfers
    pub(crate) fn context(&self, handle: &TaskHandle, destination: ChatId) -> TransferContext {
        TransferContext {
            task_id: handle.id,
            cancel: handle.token.clone(),
            destination,
            config: Arc::clone(&self.config),
            client: Arc::clone(&self.client),
            probe: Arc::clone(&self.probe),
            gates: self.gates.clone(),
            event_tx: self.event_tx.clone(),
            premium: Arc::clone(&self.premium),
        }
    }
}
