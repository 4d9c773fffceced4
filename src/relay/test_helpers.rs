//! Shared test helpers: a scripted messaging client, a recording probe and
//! relay construction on a temporary directory.

use crate::client::{GroupItem, MessagingClient, ProgressSink, UploadPayload};
use crate::config::{Config, RetryConfig, SizeLimits, ToolsConfig};
use crate::error::{Error, Result};
use crate::media::{MediaInfo, MediaProbe, ProbeCapabilities};
use crate::relay::Relay;
use crate::types::{ChatId, ChatRef, Media, Message};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Destination chat used by every test
pub(crate) const DEST: ChatId = ChatId(-100_777);

/// Source chat used by every test
pub(crate) fn source() -> ChatRef {
    ChatRef::Username("source".into())
}

pub(crate) fn video(id: i64) -> Message {
    Message::new(source(), id).with_media(Media::Video {
        file_name: Some(format!("clip_{id}.mp4")),
        file_size: Some(1024),
    })
}

pub(crate) fn photo(id: i64) -> Message {
    Message::new(source(), id).with_media(Media::Photo {
        file_size: Some(512),
    })
}

pub(crate) fn document(id: i64, file_size: u64) -> Message {
    Message::new(source(), id).with_media(Media::Document {
        file_name: Some(format!("file_{id}.bin")),
        file_size: Some(file_size),
    })
}

pub(crate) fn audio(id: i64) -> Message {
    Message::new(source(), id).with_media(Media::Audio {
        file_name: Some(format!("track_{id}.mp3")),
        file_size: Some(2048),
    })
}

pub(crate) fn text(id: i64, body: &str) -> Message {
    Message::new(source(), id).with_text(body)
}

/// Scripted failure returned by the mock client
#[derive(Clone, Copy, Debug)]
pub(crate) enum Fail {
    RateLimited(Duration),
    Transport,
    Forbidden,
    PeerInvalid,
}

impl Fail {
    fn into_error(self) -> Error {
        match self {
            Fail::RateLimited(wait) => Error::RateLimited { wait },
            Fail::Transport => Error::Transport("connection reset".into()),
            Fail::Forbidden => Error::Forbidden("CHAT_FORBIDDEN".into()),
            Fail::PeerInvalid => Error::PeerInvalid("PEER_ID_INVALID".into()),
        }
    }
}

#[derive(Default)]
struct MockState {
    messages: HashMap<i64, Message>,
    resolve_failures: HashMap<i64, VecDeque<Fail>>,
    download_failures: HashMap<i64, VecDeque<Fail>>,
    upload_failures: HashMap<i64, VecDeque<Fail>>,
    group_failures: VecDeque<Fail>,
    empty_downloads: Vec<i64>,
    stalled_downloads: Vec<i64>,
    premium_hangs: bool,
    resolve_calls: Vec<i64>,
    download_attempts: HashMap<i64, usize>,
    upload_attempts: HashMap<i64, usize>,
    uploads: Vec<UploadPayload>,
    group_uploads: Vec<Vec<GroupItem>>,
    texts: Vec<(ChatId, String)>,
    membership_checks: usize,
    premium: bool,
}

/// Counts callers inside a section and remembers the peak
struct Occupancy<'a> {
    active: &'a AtomicUsize,
}

impl<'a> Occupancy<'a> {
    fn enter(active: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for Occupancy<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory messaging client
///
/// Messages are looked up by id regardless of chat. Downloads write a small
/// real file; uploads check that the file exists and record the payload.
/// Failures are scripted per message id and consumed in order.
#[derive(Default)]
pub(crate) struct MockClient {
    state: Mutex<MockState>,
    delay: Duration,
    active_downloads: AtomicUsize,
    peak_downloads: AtomicUsize,
    active_uploads: AtomicUsize,
    peak_uploads: AtomicUsize,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every download and upload take `delay`
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn add_message(&self, message: Message) {
        self.state().messages.insert(message.id, message);
    }

    pub(crate) fn fail_resolve(&self, id: i64, fail: Fail) {
        self.state()
            .resolve_failures
            .entry(id)
            .or_default()
            .push_back(fail);
    }

    pub(crate) fn fail_download(&self, id: i64, fail: Fail) {
        self.state()
            .download_failures
            .entry(id)
            .or_default()
            .push_back(fail);
    }

    pub(crate) fn fail_upload(&self, id: i64, fail: Fail) {
        self.state()
            .upload_failures
            .entry(id)
            .or_default()
            .push_back(fail);
    }

    pub(crate) fn fail_group(&self, fail: Fail) {
        self.state().group_failures.push_back(fail);
    }

    pub(crate) fn empty_download(&self, id: i64) {
        self.state().empty_downloads.push(id);
    }

    /// Downloads of `id` start but never report progress or finish
    pub(crate) fn stall_download(&self, id: i64) {
        self.state().stalled_downloads.push(id);
    }

    pub(crate) fn set_premium(&self, premium: bool) {
        self.state().premium = premium;
    }

    /// Make the premium lookup never answer
    pub(crate) fn hang_premium(&self) {
        self.state().premium_hangs = true;
    }

    pub(crate) fn resolve_calls(&self) -> Vec<i64> {
        self.state().resolve_calls.clone()
    }

    pub(crate) fn download_attempts(&self, id: i64) -> usize {
        self.state()
            .download_attempts
            .get(&id)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn upload_attempts(&self, id: i64) -> usize {
        self.state().upload_attempts.get(&id).copied().unwrap_or(0)
    }

    pub(crate) fn uploads(&self) -> Vec<UploadPayload> {
        self.state().uploads.clone()
    }

    /// Message ids of single uploads, in upload order
    pub(crate) fn uploaded_ids(&self) -> Vec<i64> {
        self.state()
            .uploads
            .iter()
            .filter_map(|payload| message_id_of(&payload.path))
            .collect()
    }

    pub(crate) fn group_uploads(&self) -> Vec<Vec<GroupItem>> {
        self.state().group_uploads.clone()
    }

    pub(crate) fn texts(&self) -> Vec<(ChatId, String)> {
        self.state().texts.clone()
    }

    pub(crate) fn membership_checks(&self) -> usize {
        self.state().membership_checks
    }

    pub(crate) fn peak_downloads(&self) -> usize {
        self.peak_downloads.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_uploads(&self) -> usize {
        self.peak_uploads.load(Ordering::SeqCst)
    }

    fn next_failure(map: &mut HashMap<i64, VecDeque<Fail>>, id: i64) -> Option<Error> {
        map.get_mut(&id)
            .and_then(VecDeque::pop_front)
            .map(Fail::into_error)
    }
}

/// Message id from a `<download_dir>/<id>/<name>` path
pub(crate) fn message_id_of(path: &Path) -> Option<i64> {
    path.parent()?.file_name()?.to_str()?.parse().ok()
}

#[async_trait]
impl MessagingClient for MockClient {
    async fn resolve_message(&self, _chat: &ChatRef, message_id: i64) -> Result<Option<Message>> {
        let mut state = self.state();
        state.resolve_calls.push(message_id);
        if let Some(e) = Self::next_failure(&mut state.resolve_failures, message_id) {
            return Err(e);
        }
        Ok(state.messages.get(&message_id).cloned())
    }

    async fn resolve_message_group(&self, anchor: &Message) -> Result<Vec<Message>> {
        let state = self.state();
        let mut members: Vec<Message> = state
            .messages
            .values()
            .filter(|m| m.media_group_id.is_some() && m.media_group_id == anchor.media_group_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.id);
        Ok(members)
    }

    async fn download(
        &self,
        message: &Message,
        destination: &Path,
        progress: &ProgressSink,
    ) -> Result<PathBuf> {
        let _busy = Occupancy::enter(&self.active_downloads, &self.peak_downloads);
        let (failure, empty, stalled) = {
            let mut state = self.state();
            *state.download_attempts.entry(message.id).or_default() += 1;
            (
                Self::next_failure(&mut state.download_failures, message.id),
                state.empty_downloads.contains(&message.id),
                state.stalled_downloads.contains(&message.id),
            )
        };
        if let Some(e) = failure {
            return Err(e);
        }
        if stalled {
            std::future::pending::<()>().await;
        }

        tokio::time::sleep(self.delay).await;

        let body: &[u8] = if empty { b"" } else { b"media bytes" };
        tokio::fs::write(destination, body).await?;
        progress.report(body.len() as u64, body.len() as u64);
        Ok(destination.to_path_buf())
    }

    async fn upload(
        &self,
        _destination: ChatId,
        payload: &UploadPayload,
        progress: &ProgressSink,
    ) -> Result<()> {
        let _busy = Occupancy::enter(&self.active_uploads, &self.peak_uploads);
        let id = message_id_of(&payload.path).unwrap_or_default();
        let failure = {
            let mut state = self.state();
            *state.upload_attempts.entry(id).or_default() += 1;
            Self::next_failure(&mut state.upload_failures, id)
        };
        if let Some(e) = failure {
            return Err(e);
        }

        tokio::time::sleep(self.delay).await;

        if !payload.path.exists() {
            return Err(Error::Other(format!("{} does not exist", payload.path.display())));
        }
        progress.report(1, 1);
        self.state().uploads.push(payload.clone());
        Ok(())
    }

    async fn upload_group(
        &self,
        _destination: ChatId,
        items: &[GroupItem],
        progress: &ProgressSink,
    ) -> Result<()> {
        let _busy = Occupancy::enter(&self.active_uploads, &self.peak_uploads);
        let failure = self
            .state()
            .group_failures
            .pop_front()
            .map(Fail::into_error);
        if let Some(e) = failure {
            return Err(e);
        }

        tokio::time::sleep(self.delay).await;
        progress.report(items.len() as u64, items.len() as u64);
        self.state().group_uploads.push(items.to_vec());
        Ok(())
    }

    async fn send_text(&self, destination: ChatId, text: &str) -> Result<()> {
        self.state().texts.push((destination, text.to_string()));
        Ok(())
    }

    async fn is_member_of_chat(&self, _chat: &ChatRef) -> Result<bool> {
        self.state().membership_checks += 1;
        Ok(true)
    }

    async fn is_premium(&self) -> Result<bool> {
        let (premium, hangs) = {
            let state = self.state();
            (state.premium, state.premium_hangs)
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        Ok(premium)
    }
}

/// Probe returning fixed metadata and writing a real thumbnail file
#[derive(Default)]
pub(crate) struct MockProbe {
    pub(crate) info: Mutex<MediaInfo>,
    pub(crate) fail: bool,
    thumbnails: AtomicUsize,
}

impl MockProbe {
    pub(crate) fn with_info(info: MediaInfo) -> Self {
        Self {
            info: Mutex::new(info),
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn thumbnails(&self) -> usize {
        self.thumbnails.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProbe for MockProbe {
    async fn probe(&self, _path: &Path) -> Result<MediaInfo> {
        if self.fail {
            return Err(Error::ExternalTool("ffprobe exited with status 1".into()));
        }
        Ok(self.info.lock().unwrap().clone())
    }

    async fn thumbnail(&self, _video: &Path, _duration: u64, output: &Path) -> Option<PathBuf> {
        if self.fail {
            return None;
        }
        tokio::fs::write(output, b"jpeg").await.ok()?;
        self.thumbnails.fetch_add(1, Ordering::SeqCst);
        Some(output.to_path_buf())
    }

    fn capabilities(&self) -> ProbeCapabilities {
        ProbeCapabilities {
            can_probe: !self.fail,
            can_thumbnail: !self.fail,
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Configuration with millisecond delays rooted in `dir`
pub(crate) fn test_config(dir: &Path) -> Config {
    Config {
        download_dir: dir.join("downloads"),
        max_concurrent_downloads: 2,
        max_concurrent_uploads: 1,
        batch_size: 2,
        flood_wait_delay: Duration::from_millis(10),
        call_timeout: Duration::from_secs(5),
        transfer_timeout: None,
        stall_timeout: Duration::from_secs(5),
        retry: RetryConfig {
            max_attempts: 3,
            download_delay: Duration::from_millis(5),
            upload_delay: Duration::from_millis(5),
            group_delay: Duration::from_millis(5),
            rate_limit_padding: Duration::ZERO,
            jitter: false,
        },
        limits: SizeLimits::default(),
        tools: ToolsConfig {
            ffprobe_path: None,
            ffmpeg_path: None,
            search_path: false,
        },
    }
}

/// A relay wired to mocks, plus the temp dir keeping its download dir alive
pub(crate) struct TestRelay {
    pub(crate) relay: Relay,
    pub(crate) client: Arc<MockClient>,
    pub(crate) probe: Arc<MockProbe>,
    pub(crate) dir: TempDir,
}

impl TestRelay {
    pub(crate) fn download_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    /// Every file still present under the download directory
    pub(crate) fn leftover_files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, found);
                } else {
                    found.push(path);
                }
            }
        }
        let mut found = Vec::new();
        walk(&self.download_dir(), &mut found);
        found
    }
}

/// Relay on mocks with the default test configuration
pub(crate) fn create_test_relay(client: MockClient) -> TestRelay {
    create_test_relay_with(client, MockProbe::default(), |_| {})
}

/// Relay on mocks with a custom probe and configuration tweaks
pub(crate) fn create_test_relay_with(
    client: MockClient,
    probe: MockProbe,
    tweak: impl FnOnce(&mut Config),
) -> TestRelay {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    tweak(&mut config);

    let client = Arc::new(client);
    let probe = Arc::new(probe);
    let relay = Relay::new(config, client.clone(), probe.clone()).unwrap();

    TestRelay {
        relay,
        client,
        probe,
        dir,
    }
}
