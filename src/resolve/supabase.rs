//! Signed URLs from a Supabase-compatible storage API.
//!
//! Object paths in the configured bucket are signed with
//! `POST /storage/v1/object/sign/{bucket}/{path}`. Locations that are
//! already `http(s)` URLs pass through untouched.

use super::{StorageError, StorageService};
use crate::config::BackendConfig;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SIGN_PREFIX: &str = "/storage/v1/object/sign/";
const PUBLIC_PREFIX: &str = "/storage/v1/object/public/";

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    preview_expires_secs: u64,
    full_expires_secs: u64,
}

impl SupabaseStorage {
    pub fn new(cfg: &BackendConfig) -> Result<Self, StorageError> {
        let base_url = cfg.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(StorageError::NotConfigured("backend.url"));
        }
        if cfg.anon_key.trim().is_empty() {
            return Err(StorageError::NotConfigured("backend.anon_key"));
        }

        let bearer = cfg
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&cfg.anon_key);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "apikey",
            HeaderValue::from_str(cfg.anon_key.trim())
                .map_err(|_| StorageError::NotConfigured("valid backend.anon_key"))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer.trim()))
                .map_err(|_| StorageError::NotConfigured("valid backend.access_token"))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            bucket: cfg.bucket.clone(),
            preview_expires_secs: cfg.preview_expires_secs,
            full_expires_secs: cfg.full_expires_secs,
        })
    }

    fn expires_for(&self, preview_mode: bool) -> u64 {
        if preview_mode {
            self.preview_expires_secs
        } else {
            self.full_expires_secs
        }
    }

    async fn sign(&self, bucket: &str, path: &str, expires_in: u64) -> Result<String, StorageError> {
        let endpoint = sign_endpoint(&self.base_url, bucket, path);
        tracing::debug!(%bucket, %path, expires_in, "signing storage object");

        let response = self
            .http
            .post(&endpoint)
            .json(&json!({ "expiresIn": expires_in }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let signed: SignResponse = response.json().await?;
        let signed = signed.signed_url.ok_or(StorageError::MissingUrl)?;
        Ok(absolutize(&self.base_url, &signed))
    }
}

#[async_trait]
impl StorageService for SupabaseStorage {
    async fn resolve(&self, reference: &str, preview_mode: bool) -> Result<String, StorageError> {
        if is_http(reference) {
            return Ok(reference.to_string());
        }
        let path = reference.trim_start_matches('/');
        self.sign(&self.bucket, path, self.expires_for(preview_mode))
            .await
    }

    async fn force_refresh(&self, url: &str) -> Result<String, StorageError> {
        let (bucket, path) =
            parse_storage_url(url).ok_or_else(|| StorageError::NotSigned(url.to_string()))?;
        // The signing mode is unknown here; refreshed URLs get the full lifetime.
        self.sign(&bucket, &path, self.full_expires_secs).await
    }
}

/// Used when the backend section is incomplete: `http(s)` locations still
/// play, storage paths fail naming the missing setting.
#[derive(Debug, Clone)]
pub struct OfflineStorage {
    missing: &'static str,
}

impl OfflineStorage {
    pub fn new(missing: &'static str) -> Self {
        Self { missing }
    }
}

#[async_trait]
impl StorageService for OfflineStorage {
    async fn resolve(&self, reference: &str, _preview_mode: bool) -> Result<String, StorageError> {
        if is_http(reference) {
            return Ok(reference.to_string());
        }
        Err(StorageError::NotConfigured(self.missing))
    }

    async fn force_refresh(&self, url: &str) -> Result<String, StorageError> {
        Err(StorageError::NotSigned(url.to_string()))
    }
}

fn is_http(location: &str) -> bool {
    location.starts_with("https://") || location.starts_with("http://")
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn sign_endpoint(base_url: &str, bucket: &str, path: &str) -> String {
    format!(
        "{base_url}{SIGN_PREFIX}{}/{}",
        urlencoding::encode(bucket),
        encode_path(path)
    )
}

/// The sign endpoint answers with a path relative to `/storage/v1`.
fn absolutize(base_url: &str, signed: &str) -> String {
    if is_http(signed) {
        return signed.to_string();
    }
    let rel = if signed.starts_with('/') {
        signed.to_string()
    } else {
        format!("/{signed}")
    };
    if rel.starts_with("/storage/v1/") {
        format!("{base_url}{rel}")
    } else {
        format!("{base_url}/storage/v1{rel}")
    }
}

/// Extract `(bucket, object path)` from a signed or public storage URL.
fn parse_storage_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .find(SIGN_PREFIX)
        .map(|i| &url[i + SIGN_PREFIX.len()..])
        .or_else(|| url.find(PUBLIC_PREFIX).map(|i| &url[i + PUBLIC_PREFIX.len()..]))?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let (bucket, path) = rest.split_once('/')?;
    if bucket.is_empty() || path.is_empty() {
        return None;
    }
    let bucket = urlencoding::decode(bucket).ok()?.into_owned();
    let path = urlencoding::decode(path).ok()?.into_owned();
    Some((bucket, path))
}
