//! On-disk cache of signed media URLs.

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS url_cache (
  reference TEXT NOT NULL,
  preview INTEGER NOT NULL,
  url TEXT NOT NULL,
  expires_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL,
  PRIMARY KEY (reference, preview)
);

CREATE INDEX IF NOT EXISTS idx_url_cache_url ON url_cache(url);
"#,
            )
            .context("init schema")?;
        Ok(())
    }

    /// Cached URL for `reference` and its expiry, if it has not expired yet.
    pub fn get_url(
        &self,
        reference: &str,
        preview: bool,
        now_unix: i64,
    ) -> anyhow::Result<Option<(String, i64)>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT url, expires_at FROM url_cache WHERE reference=?1 AND preview=?2",
                params![reference, preview as i32],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("query url cache")?;
        Ok(row.filter(|(_, exp)| *exp > now_unix))
    }

    pub fn cache_url(
        &self,
        reference: &str,
        preview: bool,
        url: &str,
        expires_at: i64,
        now_unix: i64,
    ) -> anyhow::Result<()> {
        self.conn
            .execute(
                r#"
INSERT INTO url_cache(reference, preview, url, expires_at, updated_at)
VALUES(?1, ?2, ?3, ?4, ?5)
ON CONFLICT(reference, preview) DO UPDATE SET
  url=excluded.url,
  expires_at=excluded.expires_at,
  updated_at=excluded.updated_at
"#,
                params![reference, preview as i32, url, expires_at, now_unix],
            )
            .context("cache url")?;
        Ok(())
    }

    /// Which reference (and mode) a previously handed-out URL belongs to.
    pub fn origin_of(&self, url: &str) -> anyhow::Result<Option<(String, bool)>> {
        let row: Option<(String, i32)> = self
            .conn
            .query_row(
                "SELECT reference, preview FROM url_cache WHERE url=?1 ORDER BY updated_at DESC LIMIT 1",
                params![url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("query url origin")?;
        Ok(row.map(|(reference, preview)| (reference, preview != 0)))
    }

    pub fn purge_expired(&self, now_unix: i64) -> anyhow::Result<usize> {
        self.conn
            .execute("DELETE FROM url_cache WHERE expires_at <= ?1", params![now_unix])
            .context("purge expired urls")
    }

    pub fn clear(&self) -> anyhow::Result<usize> {
        self.conn
            .execute("DELETE FROM url_cache", [])
            .context("clear url cache")
    }

    pub fn count(&self) -> anyhow::Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM url_cache", [], |row| row.get(0))
            .context("count url cache")?;
        Ok(n as usize)
    }
}

/// `Connection` is not `Sync`; tasks carry the path and open per call
/// inside `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct StorageHandle {
    path: PathBuf,
}

impl StorageHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(&self) -> anyhow::Result<Storage> {
        Storage::open(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
