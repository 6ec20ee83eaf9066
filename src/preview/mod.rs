//! Preview lifecycle controller.
//!
//! One [`PreviewSession`] per mounted preview. The session is a plain state
//! machine: every input returns the [`Effect`]s the host must carry out
//! (start a resolution, arm a timer, tell the media element to play). It
//! never performs I/O or reads a clock, so late or superseded inputs are
//! filtered purely by generation and timer ids.

pub mod hover;
pub mod mobile;
pub mod policy;
pub mod session;

pub use hover::{HoverController, HoverSource, Playback};
pub use mobile::{MobilePolicy, Presentation};
pub use policy::{ErrorCategory, Recovery};
pub use session::PreviewSession;

use crate::config::{PlayerConfig, PreviewConfig};
use crate::media::MediaReference;
use crate::resolve::StorageError;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Resolving,
    Ready,
    PlaybackError,
    Retrying,
}

impl PreviewState {
    pub fn label(self) -> &'static str {
        match self {
            PreviewState::Idle => "idle",
            PreviewState::Resolving => "loading",
            PreviewState::Ready => "ready",
            PreviewState::PlaybackError => "error",
            PreviewState::Retrying => "retrying",
        }
    }
}

/// What the view shows when a preview fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub detail: Option<String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn from_storage(err: &StorageError) -> Self {
        Self {
            message: format!("Failed to load video: {err}"),
            detail: err.detail(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new("Timed out loading video")
            .with_detail(format!("no playable URL after {} ms", after.as_millis()))
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(d) => write!(f, "{} ({d})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

pub type TimerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    HoverEnter,
    HoverLeave,
    ResolveTimeout,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [
        TimerKind::HoverEnter,
        TimerKind::HoverLeave,
        TimerKind::ResolveTimeout,
    ];
}

/// Monotonic timer id source, one per session.
#[derive(Debug, Clone, Default)]
pub struct TimerIds(TimerId);

impl TimerIds {
    pub fn next(&mut self) -> TimerId {
        self.0 += 1;
        self.0
    }
}

/// Work requested by a session, executed in order by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Observable state changed.
    Transition { from: PreviewState, to: PreviewState },
    /// Something else in the snapshot changed (hover, playback, url).
    Notify,
    /// Start resolving; supersedes any resolution already in flight.
    Resolve {
        generation: u64,
        reference: MediaReference,
        preview_mode: bool,
    },
    CancelResolve,
    /// Arm a timer; replaces a running timer of the same kind.
    StartTimer {
        id: TimerId,
        kind: TimerKind,
        after: Duration,
    },
    CancelTimer(TimerKind),
    Load(String),
    Play,
    Pause { rewind: bool },
    SetMuted(bool),
    Unload,
}

#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub preview_mode: bool,
    pub is_mobile: bool,
    pub poster_url: Option<String>,
    pub lazy_load: bool,
    pub await_can_play: bool,
    pub muted: bool,
    /// `Some` hands hover control to the parent view for the whole session.
    pub external_hover: Option<bool>,
    pub hover_enter_delay: Duration,
    pub hover_leave_delay: Duration,
    pub resolve_timeout: Duration,
    pub max_auto_retries: u32,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self::from_config(&PreviewConfig::default(), &PlayerConfig::default())
    }
}

impl PreviewOptions {
    pub fn from_config(preview: &PreviewConfig, player: &PlayerConfig) -> Self {
        Self {
            preview_mode: preview.preview_mode,
            is_mobile: false,
            poster_url: None,
            lazy_load: preview.lazy_load,
            await_can_play: preview.await_can_play,
            muted: player.muted,
            external_hover: None,
            hover_enter_delay: preview.hover_enter_delay(),
            hover_leave_delay: preview.hover_leave_delay(),
            resolve_timeout: preview.resolve_timeout(),
            max_auto_retries: preview.max_auto_retries,
        }
    }

    pub fn with_poster(mut self, poster: Option<String>) -> Self {
        self.poster_url = poster;
        self
    }

    pub fn mobile(mut self, is_mobile: bool) -> Self {
        self.is_mobile = is_mobile;
        self
    }

    pub fn external_hover(mut self, hovering: Option<bool>) -> Self {
        self.external_hover = hovering;
        self
    }
}

/// Everything the view needs to render one preview.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewSnapshot {
    pub state: PreviewState,
    pub resolved_url: Option<String>,
    pub poster_url: Option<String>,
    pub hover: HoverSource,
    pub playing: bool,
    pub error: Option<ErrorInfo>,
    pub category: Option<ErrorCategory>,
    pub retry_count: u32,
    pub presentation: Presentation,
}
