// src/storage/refresh.rs
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::{RefreshError, UpstreamError};
use crate::models::listing::{ListedServer, ServerListPage};
use crate::storage::cache::SnapshotCache;

pub const FIRST_PAGE: u32 = 1;

/// Upper bound on pages fetched in one cycle.
pub const MAX_PAGES: u32 = 1000;

/// A paginated listing of servers.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<ServerListPage, UpstreamError>;
}

/// Refetches the whole listing and stores it in `cache` with a single
/// `set`. Any page failure abandons the cycle and leaves the previous
/// snapshot in place. Concurrent refreshes are serialized.
pub async fn refresh<S>(cache: &SnapshotCache, source: &S) -> Result<usize, RefreshError>
where
    S: PageSource + ?Sized,
{
    let _guard = cache.update_lock().lock().await;
    run_cycle(cache, source).await
}

/// Like [`refresh`] but gives up immediately when one is already running.
pub async fn refresh_if_idle<S>(cache: &SnapshotCache, source: &S) -> Result<usize, RefreshError>
where
    S: PageSource + ?Sized,
{
    let _guard = cache
        .update_lock()
        .try_lock()
        .map_err(|_| RefreshError::Busy)?;
    run_cycle(cache, source).await
}

/// Refreshes only if `cache` is still stale once the update lock is held.
/// Returns `None` when another caller refreshed it in the meantime.
pub async fn refresh_if_stale<S>(
    cache: &SnapshotCache,
    source: &S,
) -> Result<Option<usize>, RefreshError>
where
    S: PageSource + ?Sized,
{
    let _guard = cache.update_lock().lock().await;
    if !cache.needs_refresh() {
        return Ok(None);
    }
    run_cycle(cache, source).await.map(Some)
}

async fn run_cycle<S>(cache: &SnapshotCache, source: &S) -> Result<usize, RefreshError>
where
    S: PageSource + ?Sized,
{
    let servers = fetch_all(source).await?;
    let payload = serde_json::to_vec(&servers)?;
    cache.set(Bytes::from(payload)).await;
    Ok(servers.len())
}

async fn fetch_all<S>(source: &S) -> Result<Vec<ListedServer>, UpstreamError>
where
    S: PageSource + ?Sized,
{
    let mut servers = Vec::new();
    let mut page = FIRST_PAGE;
    loop {
        let response = source.fetch_page(page).await?;
        debug!(
            "Fetched page {} with {} servers (next page: {})",
            page,
            response.server_list.len(),
            response.is_next_page
        );
        servers.extend(response.server_list);
        if !response.is_next_page {
            return Ok(servers);
        }
        if page >= MAX_PAGES {
            return Err(UpstreamError::TooManyPages(MAX_PAGES));
        }
        page += 1;
    }
}

/// Background task that refreshes `cache` whenever it has gone stale,
/// checking once per refresh interval. The first check runs immediately.
pub fn spawn_refresher(cache: Arc<SnapshotCache>, source: Arc<dyn PageSource>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(cache.refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !cache.needs_refresh() {
                continue;
            }
            info!("Refreshing server list cache");
            match refresh_if_stale(&cache, source.as_ref()).await {
                Ok(Some(count)) => info!("Server list cache refreshed with {} servers", count),
                Ok(None) => debug!("Server list cache already refreshed, skipping"),
                Err(e) => error!("Server list refresh failed, keeping previous snapshot: {}", e),
            }
        }
    })
}
