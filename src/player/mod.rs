//! Media elements: whatever actually plays a resolved URL.
//!
//! Each mounted preview owns one element. The host never awaits an element
//! directly; commands go through a [`ElementDriver`] task so a slow player
//! start cannot stall the UI loop.

pub mod mpv;

pub use mpv::{MpvElement, MpvFactory};

use crate::host::{HostEvent, SessionId};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayError {
    /// The source went away (pause, unload, reload) before playback began.
    #[error("play request was interrupted")]
    Interrupted,
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementEvent {
    CanPlay,
    Error(String),
    Ended,
    PlayFailed(PlayError),
}

/// Sends element events back to the host, tagged with the owning session.
#[derive(Debug, Clone)]
pub struct ElementEvents {
    session: SessionId,
    tx: mpsc::Sender<HostEvent>,
}

impl ElementEvents {
    pub fn new(session: SessionId, tx: mpsc::Sender<HostEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub async fn send(&self, event: ElementEvent) {
        let _ = self
            .tx
            .send(HostEvent::Element {
                session: self.session,
                event,
            })
            .await;
    }
}

#[async_trait]
pub trait MediaElement: Send {
    /// Replace the current source. Readiness is reported as [`ElementEvent::CanPlay`].
    async fn load(&mut self, url: &str) -> anyhow::Result<()>;
    async fn play(&mut self) -> Result<(), PlayError>;
    async fn pause(&mut self, rewind: bool) -> anyhow::Result<()>;
    async fn set_muted(&mut self, muted: bool) -> anyhow::Result<()>;
    /// Release the source and any player resources.
    async fn unload(&mut self) -> anyhow::Result<()>;
}

pub trait ElementFactory: Send + Sync {
    fn create(&self, events: ElementEvents) -> Box<dyn MediaElement>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementCommand {
    Load(String),
    Play,
    Pause { rewind: bool },
    SetMuted(bool),
    Unload,
}

/// Runs an element's commands in order on its own task.
#[derive(Debug)]
pub struct ElementDriver {
    tx: mpsc::UnboundedSender<ElementCommand>,
    _task: JoinHandle<()>,
}

impl ElementDriver {
    pub fn spawn(element: Box<dyn MediaElement>, events: ElementEvents) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(element, events, rx));
        Self { tx, _task: task }
    }

    pub fn send(&self, cmd: ElementCommand) {
        if self.tx.send(cmd).is_err() {
            tracing::debug!("element driver already stopped");
        }
    }
}

async fn drive(
    mut element: Box<dyn MediaElement>,
    events: ElementEvents,
    mut rx: mpsc::UnboundedReceiver<ElementCommand>,
) {
    let session = events.session();
    while let Some(cmd) = rx.recv().await {
        tracing::trace!(%session, ?cmd, "element command");
        let res = match cmd {
            ElementCommand::Load(url) => element.load(&url).await,
            ElementCommand::Play => {
                if let Err(e) = element.play().await {
                    events.send(ElementEvent::PlayFailed(e)).await;
                }
                Ok(())
            }
            ElementCommand::Pause { rewind } => element.pause(rewind).await,
            ElementCommand::SetMuted(muted) => element.set_muted(muted).await,
            ElementCommand::Unload => {
                if let Err(e) = element.unload().await {
                    tracing::warn!(%session, "element unload failed: {e:#}");
                }
                break;
            }
        };
        if let Err(e) = res {
            tracing::warn!(%session, "element command failed: {e:#}");
            events.send(ElementEvent::Error(format!("{e:#}"))).await;
        }
    }
    tracing::debug!(%session, "element driver stopped");
}

/// Element that plays nothing. Every load is immediately playable.
#[derive(Debug)]
pub struct NullElement {
    events: ElementEvents,
    source: Option<String>,
}

#[async_trait]
impl MediaElement for NullElement {
    async fn load(&mut self, url: &str) -> anyhow::Result<()> {
        self.source = Some(url.to_string());
        self.events.send(ElementEvent::CanPlay).await;
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlayError> {
        match self.source {
            Some(_) => Ok(()),
            None => Err(PlayError::Interrupted),
        }
    }

    async fn pause(&mut self, _rewind: bool) -> anyhow::Result<()> {
        Ok(())
    }

    async fn set_muted(&mut self, _muted: bool) -> anyhow::Result<()> {
        Ok(())
    }

    async fn unload(&mut self) -> anyhow::Result<()> {
        self.source = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullFactory;

impl ElementFactory for NullFactory {
    fn create(&self, events: ElementEvents) -> Box<dyn MediaElement> {
        Box::new(NullElement {
            events,
            source: None,
        })
    }
}
