// src/storage/latch.rs
use tokio::sync::watch;

/// A gate that starts closed and, once opened, stays open for good.
/// Every task waiting on it is released when it opens.
#[derive(Debug)]
pub struct ReadyLatch {
    tx: watch::Sender<bool>,
}

impl ReadyLatch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn open(&self) {
        if !self.is_open() {
            self.tx.send_replace(true);
        }
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a close.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadyLatch {
    fn default() -> Self {
        Self::new()
    }
}
