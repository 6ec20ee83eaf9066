//! Preview lists on disk.
//!
//! ```toml
//! [[item]]
//! title = "Launch teaser"
//! location = "user-1/teaser.mp4"
//! poster = "https://cdn.example.com/teaser.jpg"
//!
//! [[item]]
//! title = "Local cut"
//! file = "cuts/draft.mp4"
//! ```
//!
//! Relative `file` paths are taken relative to the manifest.

use crate::host::PreviewSource;
use crate::media::MediaReference;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "item")]
    pub items: Vec<ManifestItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestItem {
    pub title: Option<String>,
    pub location: Option<String>,
    pub file: Option<PathBuf>,
    pub poster: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewItem {
    pub title: String,
    pub source: PreviewSource,
    pub poster: Option<String>,
}

impl Manifest {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("parse manifest toml")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read manifest {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Validate entries and turn them into preview sources.
    pub fn items(&self, base_dir: &Path) -> anyhow::Result<Vec<PreviewItem>> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| item.to_preview(i, base_dir))
            .collect()
    }
}

impl ManifestItem {
    fn to_preview(&self, index: usize, base_dir: &Path) -> anyhow::Result<PreviewItem> {
        let location = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());
        let source = match (location, &self.file) {
            (Some(_), Some(_)) => {
                anyhow::bail!("item {}: set either `location` or `file`, not both", index + 1)
            }
            (Some(l), None) => PreviewSource::Reference(MediaReference::parse(l)),
            (None, Some(f)) if f.is_absolute() => PreviewSource::LocalFile(f.clone()),
            (None, Some(f)) => PreviewSource::LocalFile(base_dir.join(f)),
            (None, None) => anyhow::bail!("item {}: missing `location` or `file`", index + 1),
        };
        let title = self
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| default_title(&source));
        let poster = self.poster.clone().filter(|p| !p.trim().is_empty());
        Ok(PreviewItem {
            title,
            source,
            poster,
        })
    }
}

fn default_title(source: &PreviewSource) -> String {
    match source {
        PreviewSource::Reference(r) => r
            .location()
            .rsplit('/')
            .next()
            .unwrap_or(r.location())
            .to_string(),
        PreviewSource::LocalFile(p) => p
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.display().to_string()),
    }
}
