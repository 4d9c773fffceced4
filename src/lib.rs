//! # media-relay
//!
//! Backend library that copies media posts from a source chat to a
//! destination chat through a user-authenticated messaging client.
//!
//! ## Design Philosophy
//!
//! media-relay is designed to be:
//! - **Bounded** - Downloads and uploads are capped by two independent gates
//! - **Polite** - Rate-limit waits are honoured without spending retry attempts
//! - **Leak-free** - Every local file is deleted on every exit path
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! The messaging platform itself is behind the [`client::MessagingClient`]
//! trait, and media metadata behind [`media::MediaProbe`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_relay::client::MessagingClient;
//! use media_relay::types::ChatId;
//! use media_relay::{Config, Relay, media};
//! use std::sync::Arc;
//!
//! # async fn example(client: Arc<dyn MessagingClient>) -> media_relay::Result<()> {
//! let config = Config::from_env()?;
//! let probe = media::probe_from_config(&config);
//! let relay = Relay::new(config, client, probe)?;
//!
//! // Subscribe to events
//! let mut events = relay.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! let outcome = relay
//!     .submit_link("https://t.me/somechannel/42", ChatId(-1001234567890))
//!     .await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Messaging client seam and progress reporting
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Post link parsing
pub mod links;
/// Media probing and thumbnails
pub mod media;
/// Core relay implementation (decomposed into focused submodules)
pub mod relay;
/// Retry logic for rate limits and transient failures
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use client::{MessagingClient, ProgressSink};
pub use config::Config;
pub use error::{Error, Result, TransferError};
pub use media::{FfmpegProbe, MediaProbe, NoOpProbe};
pub use relay::Relay;
pub use types::{
    BatchSummary, ChatId, ChatRef, Event, MediaKind, Message, PostLink, Stage, TaskId,
    TransferOutcome, TransferRequest,
};

/// Helper function to run the relay with graceful signal handling.
///
/// Waits for a termination signal and then calls the relay's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_relay::{Relay, run_with_shutdown};
///
/// # async fn example(relay: Relay) -> media_relay::Result<()> {
/// // Submissions run on clones of the relay; this waits for a signal
/// run_with_shutdown(relay).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_with_shutdown(relay: Relay) -> Result<()> {
    wait_for_signal().await;
    relay.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
