//! Registry of `blob:` handles standing in for local files.
//!
//! A handle is created when a preview is mounted from a file on disk and
//! revoked when that preview goes away. Media elements dereference handles
//! back to paths when they need to open the file.

use super::{EPHEMERAL_SCHEME, MediaReference};
use anyhow::Context;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    inner: Arc<Mutex<HashMap<String, PathBuf>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new handle for `path`. The file must exist.
    pub fn create(&self, path: &Path) -> anyhow::Result<MediaReference> {
        let path = path
            .canonicalize()
            .with_context(|| format!("resolve {}", path.display()))?;
        if !path.is_file() {
            anyhow::bail!("{} is not a file", path.display());
        }
        let location = format!("{EPHEMERAL_SCHEME}curator/{}", Uuid::new_v4());
        tracing::debug!(handle = %location, path = %path.display(), "allocated local handle");
        self.inner.lock().insert(location.clone(), path);
        Ok(MediaReference::ephemeral(location))
    }

    pub fn lookup(&self, location: &str) -> Option<PathBuf> {
        self.inner.lock().get(location).cloned()
    }

    /// Release a handle. Returns false if it was unknown or already revoked.
    pub fn revoke(&self, location: &str) -> bool {
        let removed = self.inner.lock().remove(location).is_some();
        if removed {
            tracing::debug!(handle = %location, "revoked local handle");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
