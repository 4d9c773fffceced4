use super::test_helpers::*;
use super::*;
use crate::types::{BatchSummary, Event, MediaKind, Message, TransferOutcome, TransferRequest};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;


/// Everything currently buffered on an event receiver
fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Poll `condition` every 5ms for up to 5 seconds
async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
