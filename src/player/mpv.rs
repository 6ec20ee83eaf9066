use super::{ElementEvent, ElementEvents, ElementFactory, MediaElement, PlayError};
use crate::config::PlayerConfig;
use crate::media::{EPHEMERAL_SCHEME, HandleRegistry};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    process::{Child, Command},
    task::JoinHandle,
};

/// Creates one [`MpvElement`] per preview session.
#[derive(Debug, Clone)]
pub struct MpvFactory {
    cfg: PlayerConfig,
    runtime_dir: PathBuf,
    handles: HandleRegistry,
}

impl MpvFactory {
    pub fn new(cfg: PlayerConfig, runtime_dir: PathBuf, handles: HandleRegistry) -> Self {
        Self {
            cfg,
            runtime_dir,
            handles,
        }
    }
}

impl ElementFactory for MpvFactory {
    fn create(&self, events: ElementEvents) -> Box<dyn MediaElement> {
        let socket_path = self
            .runtime_dir
            .join(format!("mpv-{}.sock", events.session()));
        Box::new(MpvElement {
            cfg: self.cfg.clone(),
            socket_path,
            handles: self.handles.clone(),
            events,
            process: None,
            source: None,
            muted: self.cfg.muted,
        })
    }
}

/// A preview window backed by an mpv process, started on first play.
#[derive(Debug)]
pub struct MpvElement {
    cfg: PlayerConfig,
    socket_path: PathBuf,
    handles: HandleRegistry,
    events: ElementEvents,
    process: Option<MpvProcess>,
    /// What mpv should open: a URL or a dereferenced local path.
    source: Option<String>,
    muted: bool,
}

impl MpvElement {
    fn playable(&self, url: &str) -> anyhow::Result<String> {
        if !url.starts_with(EPHEMERAL_SCHEME) {
            return Ok(url.to_string());
        }
        let path = self
            .handles
            .lookup(url)
            .with_context(|| format!("blob handle {url} was revoked"))?;
        Ok(path.display().to_string())
    }

    /// Returns the running process and whether it was just started.
    async fn ensure_process(&mut self) -> anyhow::Result<(&MpvProcess, bool)> {
        let stale = self.process.as_mut().is_some_and(|p| p.exited());
        if stale {
            tracing::debug!(socket = %self.socket_path.display(), "mpv exited; restarting");
            self.process = None;
        }
        let fresh = self.process.is_none();
        if fresh {
            let process = MpvProcess::spawn(
                &self.cfg,
                &self.socket_path,
                self.muted,
                self.events.clone(),
            )
            .await?;
            self.process = Some(process);
        }
        let process = self.process.as_ref().context("mpv process missing")?;
        Ok((process, fresh))
    }
}

#[async_trait]
impl MediaElement for MpvElement {
    async fn load(&mut self, url: &str) -> anyhow::Result<()> {
        let source = self.playable(url)?;
        self.source = Some(source.clone());
        match &self.process {
            // `file-loaded` reports readiness.
            Some(p) => {
                p.command(json!({"command":["loadfile", source, "replace"]}))
                    .await?;
                p.command(json!({"command":["set_property", "pause", true]}))
                    .await
            }
            None => {
                self.events.send(ElementEvent::CanPlay).await;
                Ok(())
            }
        }
    }

    async fn play(&mut self) -> Result<(), PlayError> {
        let Some(source) = self.source.clone() else {
            return Err(PlayError::Interrupted);
        };
        let (process, fresh) = self
            .ensure_process()
            .await
            .map_err(|e| PlayError::Failed(format!("{e:#}")))?;
        let res = async {
            if fresh {
                process
                    .command(json!({"command":["loadfile", source.as_str(), "replace"]}))
                    .await?;
            }
            process
                .command(json!({"command":["set_property", "pause", false]}))
                .await
        }
        .await;
        res.map_err(|e| PlayError::Failed(format!("{e:#}")))
    }

    async fn pause(&mut self, rewind: bool) -> anyhow::Result<()> {
        let Some(p) = &self.process else {
            return Ok(());
        };
        p.command(json!({"command":["set_property", "pause", true]}))
            .await?;
        if rewind {
            p.command(json!({"command":["seek", 0, "absolute"]})).await?;
        }
        Ok(())
    }

    async fn set_muted(&mut self, muted: bool) -> anyhow::Result<()> {
        self.muted = muted;
        match &self.process {
            Some(p) => {
                p.command(json!({"command":["set_property", "mute", muted]}))
                    .await
            }
            None => Ok(()),
        }
    }

    async fn unload(&mut self) -> anyhow::Result<()> {
        self.source = None;
        if let Some(p) = self.process.take() {
            p.quit().await;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct MpvProcess {
    child: Child,
    socket_path: PathBuf,
    writer: tokio::sync::Mutex<tokio::io::WriteHalf<UnixStream>>,
    request_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl MpvProcess {
    async fn spawn(
        cfg: &PlayerConfig,
        socket_path: &Path,
        muted: bool,
        events: ElementEvents,
    ) -> anyhow::Result<Self> {
        let _ = std::fs::remove_file(socket_path);
        if let Some(dir) = socket_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create {}", dir.display()))?;
        }

        let mut cmd = Command::new(&cfg.mpv_path);
        cmd.args([
            "--idle=yes",
            "--force-window=yes",
            "--keep-open=yes",
            "--input-terminal=no",
            "--really-quiet",
            "--pause",
        ]);
        cmd.arg(format!("--title=curator preview {}", events.session()));
        cmd.arg(format!("--mute={}", if muted { "yes" } else { "no" }));
        if cfg.loop_preview {
            cmd.arg("--loop-file=inf");
        }
        cmd.args(&cfg.extra_args);
        let child = cmd
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {}", cfg.mpv_path.display()))?;

        let stream = connect_with_retry(socket_path).await?;
        let (reader, writer) = tokio::io::split(stream);
        let reader = tokio::spawn(read_events_loop(reader, events));

        let this = Self {
            child,
            socket_path: socket_path.to_path_buf(),
            writer: tokio::sync::Mutex::new(writer),
            request_id: AtomicU64::new(1),
            reader,
        };
        this.command(json!({"command":["request_log_messages", "warn"]}))
            .await?;
        tracing::info!(socket = %this.socket_path.display(), "mpv started");
        Ok(this)
    }

    fn exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    async fn quit(self) {
        if let Err(e) = self.command(json!({"command":["quit"]})).await {
            tracing::debug!("mpv quit failed: {e:#}");
        }
        // Drop kills the child if it ignored `quit`.
    }

    async fn command(&self, mut v: serde_json::Value) -> anyhow::Result<()> {
        if v.get("request_id").is_none() {
            let id = self.request_id.fetch_add(1, Ordering::Relaxed);
            if let serde_json::Value::Object(ref mut o) = v {
                o.insert("request_id".to_string(), serde_json::Value::from(id));
            }
        }
        let mut w = self.writer.lock().await;
        let mut line = serde_json::to_vec(&v).context("encode mpv json")?;
        line.push(b'\n');
        w.write_all(&line).await.context("write mpv ipc")?;
        w.flush().await.context("flush mpv ipc")?;
        Ok(())
    }
}

impl Drop for MpvProcess {
    fn drop(&mut self) {
        self.reader.abort();
        let _ = self.child.start_kill();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn connect_with_retry(path: &Path) -> anyhow::Result<UnixStream> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        match UnixStream::connect(path).await {
            Ok(s) => return Ok(s),
            Err(e) => {
                if tokio::time::Instant::now() > deadline {
                    return Err(e)
                        .with_context(|| format!("connect to mpv ipc {}", path.display()));
                }
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
}

async fn read_events_loop(reader: tokio::io::ReadHalf<UnixStream>, events: ElementEvents) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(v) = serde_json::from_str::<serde_json::Value>(&line) else {
            continue;
        };
        if let (Some(rid), Some(err)) = (v.get("request_id"), v.get("error"))
            && let Some(err_s) = err.as_str()
            && err_s != "success"
        {
            tracing::warn!(session = %events.session(), request_id = %rid, "mpv ipc error: {err_s}");
        }
        if let Some(ev) = map_mpv_event(&v) {
            events.send(ev).await;
        }
    }
}

fn map_mpv_event(v: &serde_json::Value) -> Option<ElementEvent> {
    match v.get("event")?.as_str()? {
        "file-loaded" => Some(ElementEvent::CanPlay),
        "end-file" => {
            let reason = v.get("reason").and_then(|x| x.as_str()).unwrap_or("");
            match reason {
                "error" => {
                    let err = v.get("file_error").or_else(|| v.get("error"));
                    let err = err.and_then(|x| x.as_str()).unwrap_or("unknown");
                    Some(ElementEvent::Error(format!("mpv end-file error: {err}")))
                }
                "eof" => Some(ElementEvent::Ended),
                _ => None,
            }
        }
        "log-message" => {
            let level = v.get("level").and_then(|x| x.as_str()).unwrap_or("info");
            let text = v.get("text").and_then(|x| x.as_str()).unwrap_or("").trim();
            if !text.is_empty() {
                tracing::warn!(target: "mpv", "{level}: {text}");
            }
            None
        }
        _ => None,
    }
}
