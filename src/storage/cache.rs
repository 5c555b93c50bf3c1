// src/storage/cache.rs
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use log::{debug, info, warn};
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::models::listing::ListedServer;
use crate::storage::latch::ReadyLatch;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub max_age: Duration,
    pub refresh_interval: Duration,
}

#[derive(Debug, Default)]
struct Snapshot {
    payload: Bytes,
    last_updated: Option<SystemTime>,
}

/// Last good copy of the upstream server list.
///
/// Readers get a cheap clone of the current payload and never see a
/// half-written one. The first-load gate holds readers of a cold cache
/// until the first `set`; after that reads never wait.
pub struct SnapshotCache {
    config: CacheConfig,
    snapshot: RwLock<Snapshot>,
    ready: ReadyLatch,
    update_lock: Mutex<()>,
    updates: AtomicU64,
}

impl SnapshotCache {
    /// An empty cache with the gate closed.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            snapshot: RwLock::new(Snapshot::default()),
            ready: ReadyLatch::new(),
            update_lock: Mutex::new(()),
            updates: AtomicU64::new(0),
        }
    }

    /// Starts from the persisted file when there is one. A missing, empty,
    /// unreadable or undecodable file leaves the cache cold.
    pub fn load(config: CacheConfig) -> Self {
        let cache = Self::new(config);
        match read_snapshot(&cache.config.path) {
            Ok(Some(snapshot)) => {
                info!(
                    "Loaded {} cached bytes from {}",
                    snapshot.payload.len(),
                    cache.config.path.display()
                );
                *cache.snapshot.write() = snapshot;
                cache.ready.open();
            }
            Ok(None) => info!("No cache file at {}, starting cold", cache.config.path.display()),
            Err(e) => warn!("Ignoring cache file {}: {}", cache.config.path.display(), e),
        }
        cache
    }

    /// Current payload; waits only while the first load is outstanding.
    pub async fn get(&self) -> Bytes {
        self.ready.wait().await;
        self.current()
    }

    /// Current payload without waiting; empty before the first load.
    pub fn current(&self) -> Bytes {
        self.snapshot.read().payload.clone()
    }

    /// Swaps in a new payload and writes it to the cache file off the
    /// async workers. A failed write is logged and the in-memory copy is kept.
    pub async fn set(&self, payload: Bytes) {
        {
            let mut snapshot = self.snapshot.write();
            snapshot.payload = payload.clone();
            snapshot.last_updated = Some(SystemTime::now());
        }
        self.updates.fetch_add(1, Ordering::Relaxed);
        self.ready.open();

        let path = self.config.path.clone();
        let len = payload.len();
        match tokio::task::spawn_blocking(move || persist(&path, &payload)).await {
            Ok(Ok(())) => debug!("Persisted {} bytes to {}", len, self.config.path.display()),
            Ok(Err(e)) => warn!(
                "Failed to persist cache to {}: {}",
                self.config.path.display(),
                e
            ),
            Err(e) => warn!("Cache persistence task failed: {}", e),
        }
    }

    pub fn needs_refresh(&self) -> bool {
        match self.snapshot.read().last_updated {
            Some(at) => at.elapsed().map_or(true, |age| age > self.config.max_age),
            None => true,
        }
    }

    pub fn last_updated(&self) -> Option<SystemTime> {
        self.snapshot.read().last_updated
    }

    /// Number of `set` calls since start-up.
    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_open()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.config.refresh_interval
    }

    pub(crate) fn update_lock(&self) -> &Mutex<()> {
        &self.update_lock
    }
}

fn read_snapshot(path: &Path) -> io::Result<Option<Snapshot>> {
    let payload = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if payload.is_empty() {
        return Ok(None);
    }
    if let Err(e) = serde_json::from_slice::<Vec<ListedServer>>(&payload) {
        return Err(io::Error::new(io::ErrorKind::InvalidData, e));
    }
    let last_updated = fs::metadata(path).and_then(|m| m.modified()).ok();
    Ok(Some(Snapshot {
        payload: Bytes::from(payload),
        last_updated,
    }))
}

fn persist(path: &Path, payload: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, payload)?;
    fs::rename(&tmp, path)
}
