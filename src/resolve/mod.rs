//! Turning stored media references into playable URLs.

pub mod cached;
pub mod supabase;

pub use cached::CachingStorage;
pub use supabase::{OfflineStorage, SupabaseStorage};

use crate::media::MediaReference;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend is not configured ({0} missing)")]
    NotConfigured(&'static str),

    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("storage response did not contain a signed URL")]
    MissingUrl,

    #[error("not a storage URL that can be re-signed: {0}")]
    NotSigned(String),

    #[error("could not resolve video URL")]
    Empty,

    #[error("url cache: {0}")]
    Cache(String),
}

impl StorageError {
    /// Technical detail for the error panel, when the backend gave one.
    pub fn detail(&self) -> Option<String> {
        match self {
            StorageError::Status { body, .. } if !body.trim().is_empty() => {
                Some(body.trim().to_string())
            }
            StorageError::Request(e) => {
                let mut chain = Vec::new();
                let mut source = std::error::Error::source(e);
                while let Some(s) = source {
                    chain.push(s.to_string());
                    source = s.source();
                }
                (!chain.is_empty()).then(|| chain.join(": "))
            }
            StorageError::Cache(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}

/// The external storage collaborator.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Produce a playable URL for a stable reference.
    async fn resolve(&self, reference: &str, preview_mode: bool) -> Result<String, StorageError>;

    /// Re-sign a URL that was handed out earlier (e.g. because it expired).
    async fn force_refresh(&self, url: &str) -> Result<String, StorageError>;
}

/// Ephemeral references are their own playable URL.
pub fn resolve_immediate(reference: &MediaReference) -> Option<String> {
    reference
        .is_ephemeral()
        .then(|| reference.location().to_string())
}

pub async fn resolve_reference(
    storage: &dyn StorageService,
    reference: &MediaReference,
    preview_mode: bool,
) -> Result<String, StorageError> {
    if let Some(url) = resolve_immediate(reference) {
        return Ok(url);
    }
    let url = storage.resolve(reference.location(), preview_mode).await?;
    let url = url.trim();
    if url.is_empty() {
        return Err(StorageError::Empty);
    }
    Ok(url.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted storage: answers from a table, counts calls.
    #[derive(Debug, Clone, Default)]
    pub struct FakeStorage {
        pub answers: Arc<Mutex<HashMap<String, Result<String, String>>>>,
        pub refreshes: Arc<Mutex<HashMap<String, String>>>,
        pub calls: Arc<AtomicUsize>,
        pub delay: Option<std::time::Duration>,
    }

    impl FakeStorage {
        pub fn with(reference: &str, url: &str) -> Self {
            let s = Self::default();
            s.answer(reference, Ok(url.to_string()));
            s
        }

        pub fn answer(&self, reference: &str, answer: Result<String, String>) {
            self.answers.lock().insert(reference.to_string(), answer);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StorageService for FakeStorage {
        async fn resolve(&self, reference: &str, _preview: bool) -> Result<String, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let answer = self.answers.lock().get(reference).cloned();
            match answer {
                Some(Ok(url)) => Ok(url),
                Some(Err(body)) => Err(StorageError::Status { status: 500, body }),
                None => Err(StorageError::Status {
                    status: 404,
                    body: format!("{reference} could not be loaded from database"),
                }),
            }
        }

        async fn force_refresh(&self, url: &str) -> Result<String, StorageError> {
            self.refreshes
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| StorageError::NotSigned(url.to_string()))
        }
    }
}
