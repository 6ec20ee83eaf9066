use super::{StorageError, StorageService};
use crate::bus::RefreshBus;
use crate::config::BackendConfig;
use crate::storage::StorageHandle;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

const MEMORY_ENTRIES: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => unreachable!(),
};

/// Cached entries are dropped this long before the signed URL itself expires.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedUrl {
    url: String,
    expires_at: i64,
}

/// Wraps a storage service with an in-memory LRU and an optional SQLite
/// cache, and announces re-signed URLs on the [`RefreshBus`].
pub struct CachingStorage<S> {
    inner: S,
    bus: RefreshBus,
    disk: Option<StorageHandle>,
    memory: Mutex<LruCache<(String, bool), CachedUrl>>,
    origins: Mutex<LruCache<String, (String, bool)>>,
    preview_ttl: i64,
    full_ttl: i64,
}

impl<S: StorageService> CachingStorage<S> {
    pub fn new(inner: S, bus: RefreshBus, cfg: &BackendConfig) -> Self {
        Self {
            inner,
            bus,
            disk: None,
            memory: Mutex::new(LruCache::new(MEMORY_ENTRIES)),
            origins: Mutex::new(LruCache::new(MEMORY_ENTRIES)),
            preview_ttl: ttl(cfg.preview_expires_secs),
            full_ttl: ttl(cfg.full_expires_secs),
        }
    }

    pub fn with_disk(mut self, handle: StorageHandle) -> Self {
        self.disk = Some(handle);
        self
    }

    pub fn bus(&self) -> &RefreshBus {
        &self.bus
    }

    fn memory_get(&self, reference: &str, preview: bool, now: i64) -> Option<String> {
        let mut memory = self.memory.lock();
        let key = (reference.to_string(), preview);
        match memory.get(&key) {
            Some(c) if c.expires_at > now => Some(c.url.clone()),
            Some(_) => {
                memory.pop(&key);
                None
            }
            None => None,
        }
    }

    async fn remember(&self, reference: &str, preview: bool, url: &str, now: i64) {
        let expires_at = now + if preview { self.preview_ttl } else { self.full_ttl };
        self.memory.lock().put(
            (reference.to_string(), preview),
            CachedUrl {
                url: url.to_string(),
                expires_at,
            },
        );
        self.origins
            .lock()
            .put(url.to_string(), (reference.to_string(), preview));

        let Some(disk) = self.disk.clone() else {
            return;
        };
        let (reference, url) = (reference.to_string(), url.to_string());
        let res = tokio::task::spawn_blocking(move || {
            disk.open()?
                .cache_url(&reference, preview, &url, expires_at, now)
        })
        .await;
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("url cache write failed: {e:#}"),
            Err(e) => tracing::warn!("url cache task failed: {e}"),
        }
    }

    async fn disk_get(&self, reference: &str, preview: bool, now: i64) -> Option<CachedUrl> {
        let disk = self.disk.clone()?;
        let reference = reference.to_string();
        match tokio::task::spawn_blocking(move || disk.open()?.get_url(&reference, preview, now))
            .await
        {
            Ok(Ok(row)) => row.map(|(url, expires_at)| CachedUrl { url, expires_at }),
            Ok(Err(e)) => {
                tracing::warn!("url cache read failed: {e:#}");
                None
            }
            Err(e) => {
                tracing::warn!("url cache task failed: {e}");
                None
            }
        }
    }

    async fn origin_of(&self, url: &str) -> Option<(String, bool)> {
        let remembered = self.origins.lock().get(url).cloned();
        if remembered.is_some() {
            return remembered;
        }
        let disk = self.disk.clone()?;
        let url = url.to_string();
        match tokio::task::spawn_blocking(move || disk.open()?.origin_of(&url)).await {
            Ok(Ok(origin)) => origin,
            Ok(Err(e)) => {
                tracing::warn!("url cache read failed: {e:#}");
                None
            }
            Err(_) => None,
        }
    }

    /// Drop every cached URL. Returns the number of on-disk rows removed.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        self.memory.lock().clear();
        self.origins.lock().clear();
        let Some(disk) = self.disk.clone() else {
            return Ok(0);
        };
        tokio::task::spawn_blocking(move || disk.open()?.clear())
            .await
            .map_err(|e| StorageError::Cache(e.to_string()))?
            .map_err(|e| StorageError::Cache(format!("{e:#}")))
    }
}

#[async_trait]
impl<S: StorageService> StorageService for CachingStorage<S> {
    async fn resolve(&self, reference: &str, preview_mode: bool) -> Result<String, StorageError> {
        let now = now_unix();
        if let Some(url) = self.memory_get(reference, preview_mode, now) {
            tracing::debug!(%reference, "url served from memory");
            return Ok(url);
        }
        if let Some(cached) = self.disk_get(reference, preview_mode, now).await {
            tracing::debug!(%reference, "url served from disk cache");
            let url = cached.url.clone();
            self.memory
                .lock()
                .put((reference.to_string(), preview_mode), cached);
            self.origins
                .lock()
                .put(url.clone(), (reference.to_string(), preview_mode));
            return Ok(url);
        }

        let url = self.inner.resolve(reference, preview_mode).await?;
        tracing::info!(%reference, preview_mode, "resolved media url");
        self.remember(reference, preview_mode, &url, now).await;
        Ok(url)
    }

    async fn force_refresh(&self, url: &str) -> Result<String, StorageError> {
        let fresh = self.inner.force_refresh(url).await?;
        match self.origin_of(url).await {
            Some((reference, preview)) => {
                self.remember(&reference, preview, &fresh, now_unix()).await;
                self.bus.publish(&reference, &fresh);
            }
            None => tracing::debug!("refreshed url has no known reference"),
        }
        Ok(fresh)
    }
}

fn ttl(expires_secs: u64) -> i64 {
    (expires_secs as i64 - EXPIRY_MARGIN_SECS).max(0)
}

pub(crate) fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
