use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub preview: PreviewConfig,
    pub player: PlayerConfig,
    pub input: InputConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public (anon) API key sent as `apikey`.
    pub anon_key: String,
    /// User session token; falls back to the anon key when unset.
    pub access_token: Option<String>,
    /// Storage bucket holding uploaded videos.
    pub bucket: String,
    /// Lifetime of signed URLs handed to previews.
    pub preview_expires_secs: u64,
    /// Lifetime of signed URLs for full playback.
    pub full_expires_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub hover_enter_delay_ms: u64,
    /// Never longer than the enter delay, see [`PreviewConfig::hover_leave_delay`].
    pub hover_leave_delay_ms: u64,
    pub resolve_timeout_ms: u64,
    pub max_auto_retries: u32,
    /// Pausing also seeks back to the start.
    pub preview_mode: bool,
    /// Defer URL resolution until the first hover.
    pub lazy_load: bool,
    /// Stay in `Resolving` until the media element reports it can play.
    pub await_can_play: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// mpv binary to spawn per preview.
    pub mpv_path: PathBuf,
    pub muted: bool,
    pub loop_preview: bool,
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub mouse: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            access_token: None,
            bucket: "videos".to_string(),
            preview_expires_secs: 3600,
            full_expires_secs: 4 * 3600,
            request_timeout_secs: 15,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            hover_enter_delay_ms: 50,
            hover_leave_delay_ms: 0,
            resolve_timeout_ms: 10_000,
            max_auto_retries: 1,
            preview_mode: true,
            lazy_load: false,
            await_can_play: false,
        }
    }
}

impl PreviewConfig {
    pub fn hover_enter_delay(&self) -> Duration {
        Duration::from_millis(self.hover_enter_delay_ms)
    }

    /// Hover-leave acts no later than hover-enter so playback never sticks.
    pub fn hover_leave_delay(&self) -> Duration {
        Duration::from_millis(self.hover_leave_delay_ms.min(self.hover_enter_delay_ms))
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mpv_path: PathBuf::from("mpv"),
            muted: true,
            loop_preview: true,
            extra_args: Vec::new(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { mouse: true }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let proj = ProjectDirs::from("dev", "curator", "curator");
        let data_dir = proj
            .as_ref()
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("curator"));
        Self { data_dir }
    }
}

impl Config {
    pub fn cache_db_path(&self) -> PathBuf {
        self.paths.data_dir.join("url-cache.sqlite3")
    }

    pub fn log_path(&self) -> PathBuf {
        self.paths.data_dir.join("curator.log")
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj =
        ProjectDirs::from("dev", "curator", "curator").context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        let cfg = defaults::defaults();
        write_config(&path, &cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

fn write_config(path: &Path, cfg: &Config) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    // The file may carry an access token.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.backend.bucket, "videos");
        assert_eq!(cfg.preview.max_auto_retries, 1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[backend]\nurl = \"https://example.supabase.co\"\n\n[preview]\nhover_enter_delay_ms = 80\n",
        )
        .unwrap();

        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.backend.url, "https://example.supabase.co");
        assert_eq!(cfg.backend.bucket, "videos");
        assert_eq!(cfg.preview.hover_enter_delay_ms, 80);
        assert_eq!(cfg.preview.resolve_timeout_ms, 10_000);
        assert!(cfg.player.muted);
    }

    #[test]
    fn test_save_round_trips_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.backend.access_token = Some("token".into());
        cfg.preview.lazy_load = true;

        write_config(&path, &cfg).unwrap();
        let back = load(Some(&path)).unwrap();
        assert_eq!(back.backend.access_token.as_deref(), Some("token"));
        assert!(back.preview.lazy_load);
    }

    #[test]
    fn test_leave_delay_clamped_to_enter_delay() {
        let cfg = PreviewConfig {
            hover_enter_delay_ms: 40,
            hover_leave_delay_ms: 200,
            ..PreviewConfig::default()
        };
        assert_eq!(cfg.hover_leave_delay(), Duration::from_millis(40));
    }
}
