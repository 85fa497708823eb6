//! Image sources.
//!
//! A source resolves image file names to natural dimensions. Loads run on
//! short-lived worker threads and report through a channel, so engine ticks
//! can poll for completion without blocking.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "http")]
use crate::error::{Error, Result};

/// Natural pixel dimensions of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

type LoadReply = std::result::Result<ImageDimensions, String>;

/// Completion state of a single load request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Still in flight
    Pending,
    Ready(ImageDimensions),
    /// The source could not produce the image
    Failed(String),
    /// The deadline passed without a reply
    TimedOut,
}

/// A pollable handle for one in-flight image load
pub struct LoadTicket {
    key: String,
    rx: Receiver<LoadReply>,
    deadline: Instant,
    timeout: Duration,
    // Keeps the channel open for requests that will never complete
    _hold: Option<Sender<LoadReply>>,
}

impl LoadTicket {
    fn spawn<F>(key: &str, timeout: Duration, work: F) -> Self
    where
        F: FnOnce() -> LoadReply + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(work());
        });
        Self {
            key: key.to_string(),
            rx,
            deadline: Instant::now() + timeout,
            timeout,
            _hold: None,
        }
    }

    /// A ticket that is already complete when handed out
    pub fn immediate(key: &str, timeout: Duration, reply: LoadReply) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(reply);
        Self {
            key: key.to_string(),
            rx,
            deadline: Instant::now() + timeout,
            timeout,
            _hold: None,
        }
    }

    /// A ticket that never completes; polls report `TimedOut` once the
    /// deadline passes
    pub fn stalled(key: &str, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            key: key.to_string(),
            rx,
            deadline: Instant::now() + timeout,
            timeout,
            _hold: Some(tx),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Check for completion without blocking
    pub fn poll(&self) -> LoadStatus {
        match self.rx.try_recv() {
            Ok(Ok(dims)) => LoadStatus::Ready(dims),
            Ok(Err(e)) => LoadStatus::Failed(e),
            Err(TryRecvError::Empty) => {
                if Instant::now() >= self.deadline {
                    LoadStatus::TimedOut
                } else {
                    LoadStatus::Pending
                }
            }
            Err(TryRecvError::Disconnected) => LoadStatus::Failed("load worker exited".to_string()),
        }
    }

    /// Block until completion or the deadline
    pub fn wait(&self) -> LoadStatus {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match self.rx.recv_timeout(remaining) {
            Ok(Ok(dims)) => LoadStatus::Ready(dims),
            Ok(Err(e)) => LoadStatus::Failed(e),
            Err(RecvTimeoutError::Timeout) => LoadStatus::TimedOut,
            Err(RecvTimeoutError::Disconnected) => LoadStatus::Failed("load worker exited".to_string()),
        }
    }
}

/// Resolves image file names to natural dimensions
pub trait ImageSource: Send + Sync {
    /// Begin loading `key`; the engine polls the returned ticket
    fn request(&self, key: &str, timeout: Duration) -> LoadTicket;

    /// Human-readable origin for log lines
    fn describe(&self) -> String;
}

/// Loads images from a local folder.
///
/// Only the header bytes are decoded, which is enough to learn the natural
/// dimensions without paying full decode cost.
pub struct FolderSource {
    root: PathBuf,
}

impl FolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageSource for FolderSource {
    fn request(&self, key: &str, timeout: Duration) -> LoadTicket {
        let path = self.root.join(key);
        LoadTicket::spawn(key, timeout, move || match image::image_dimensions(&path) {
            Ok((width, height)) => Ok(ImageDimensions { width, height }),
            Err(e) => Err(format!("{}: {}", path.display(), e)),
        })
    }

    fn describe(&self) -> String {
        format!("folder {}", self.root.display())
    }
}

/// Fetches image bytes over HTTP and reads their dimensions
#[cfg(feature = "http")]
pub struct HttpSource {
    base: url::Url,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpSource {
    /// `base` should end with a slash so file names join as children of
    /// the folder rather than siblings of it
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let base = url::Url::parse(base)
            .map_err(|e| Error::ConfigError(format!("image base url {}: {}", base, e)))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { base, client })
    }
}

#[cfg(feature = "http")]
impl ImageSource for HttpSource {
    fn request(&self, key: &str, timeout: Duration) -> LoadTicket {
        let url = self.base.join(key);
        let client = self.client.clone();
        LoadTicket::spawn(key, timeout, move || {
            let url = url.map_err(|e| e.to_string())?;
            let res = client.get(url.clone()).send().map_err(|e| e.to_string())?;
            if !res.status().is_success() {
                return Err(format!("{}: HTTP {}", url, res.status()));
            }
            let bytes = res.bytes().map_err(|e| e.to_string())?;
            let img =
                image::load_from_memory(&bytes).map_err(|e| format!("{}: {}", url, e))?;
            Ok(ImageDimensions {
                width: img.width(),
                height: img.height(),
            })
        })
    }

    fn describe(&self) -> String {
        format!("http {}", self.base)
    }
}

/// Deterministic in-memory source for tests and benches
#[derive(Default)]
pub struct FakeSource {
    sizes: Mutex<HashMap<String, ImageDimensions>>,
    failing: Mutex<HashSet<String>>,
    stalling: Mutex<HashSet<String>>,
    requests: Mutex<usize>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image with the given natural dimensions
    pub fn insert(&self, key: &str, width: u32, height: u32) {
        self.sizes
            .lock()
            .unwrap()
            .insert(key.to_string(), ImageDimensions { width, height });
    }

    /// Builder-style variant of [`FakeSource::insert`]
    pub fn with_image(self, key: &str, width: u32, height: u32) -> Self {
        self.insert(key, width, height);
        self
    }

    /// Make `key` fail on every load
    pub fn fail(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    /// Make `key` hang until the caller's deadline passes
    pub fn stall(&self, key: &str) {
        self.stalling.lock().unwrap().insert(key.to_string());
    }

    /// Number of load requests made so far
    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

impl ImageSource for FakeSource {
    fn request(&self, key: &str, timeout: Duration) -> LoadTicket {
        *self.requests.lock().unwrap() += 1;
        if self.stalling.lock().unwrap().contains(key) {
            return LoadTicket::stalled(key, timeout);
        }
        if self.failing.lock().unwrap().contains(key) {
            return LoadTicket::immediate(key, timeout, Err(format!("{}: injected failure", key)));
        }
        match self.sizes.lock().unwrap().get(key) {
            Some(dims) => LoadTicket::immediate(key, timeout, Ok(*dims)),
            None => LoadTicket::immediate(key, timeout, Err(format!("{}: not registered", key))),
        }
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_source_ready() {
        let source = FakeSource::new().with_image("a.png", 200, 100);
        let ticket = source.request("a.png", Duration::from_millis(1000));
        assert_eq!(
            ticket.wait(),
            LoadStatus::Ready(ImageDimensions {
                width: 200,
                height: 100
            })
        );
        assert_eq!(source.requests(), 1);
    }

    #[test]
    fn test_fake_source_unknown_key_fails() {
        let source = FakeSource::new();
        let ticket = source.request("ghost.png", Duration::from_millis(1000));
        assert!(matches!(ticket.wait(), LoadStatus::Failed(_)));
    }

    #[test]
    fn test_fake_source_injected_failure() {
        let source = FakeSource::new().with_image("a.png", 10, 10);
        source.fail("a.png");
        let ticket = source.request("a.png", Duration::from_millis(1000));
        assert!(matches!(ticket.poll(), LoadStatus::Failed(_)));
    }

    #[test]
    fn test_stalled_ticket_times_out() {
        let source = FakeSource::new();
        source.stall("slow.png");

        let pending = source.request("slow.png", Duration::from_millis(5000));
        assert_eq!(pending.poll(), LoadStatus::Pending);

        let expired = source.request("slow.png", Duration::ZERO);
        assert_eq!(expired.poll(), LoadStatus::TimedOut);
        assert_eq!(expired.wait(), LoadStatus::TimedOut);
    }

    #[test]
    fn test_folder_source_missing_file() {
        let source = FolderSource::new("/nonexistent-folder");
        let ticket = source.request("missing.png", Duration::from_millis(2000));
        assert!(matches!(ticket.wait(), LoadStatus::Failed(_)));
    }

    #[test]
    fn test_folder_source_reads_dimensions() {
        let dir = std::env::temp_dir().join("scrollwall-source-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("small.png");
        image::RgbaImage::new(8, 5).save(&path).unwrap();

        let source = FolderSource::new(dir);
        let ticket = source.request("small.png", Duration::from_millis(2000));
        match ticket.wait() {
            LoadStatus::Ready(dims) => {
                assert_eq!(dims.width, 8);
                assert_eq!(dims.height, 5);
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }
}
