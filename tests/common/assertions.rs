//! Custom test assertions for integration tests

use media_relay::Event;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;

/// Every regular file below `dir` (empty when `dir` does not exist)
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Assert that a transfer left nothing behind in the download directory
pub fn assert_no_files_left(dir: &Path) {
    let left = files_under(dir);
    assert!(left.is_empty(), "files left behind: {left:?}");
}

/// Collect events until `stop` matches or `timeout` passes
///
/// Returns everything received, including the matching event.
pub async fn collect_events_until(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    stop: impl Fn(&Event) -> bool,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = stop(&event);
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    seen
}
