use crate::host::{PreviewSource, SessionId};
use crate::preview::PreviewSnapshot;
use ratatui::layout::Rect;

/// How hover reaches the previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoverMode {
    /// Pointer enter/leave on the focused row, debounced by the session.
    #[default]
    Pointer,
    /// The list drives each preview's hover flag directly.
    External,
}

impl HoverMode {
    pub fn label(self) -> &'static str {
        match self {
            HoverMode::Pointer => "pointer hover",
            HoverMode::External => "external hover",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub created_at: std::time::Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Success,
            created_at: std::time::Instant::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Error,
            created_at: std::time::Instant::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > std::time::Duration::from_secs(3)
    }
}

#[derive(Debug, Clone)]
pub struct PreviewRow {
    pub title: String,
    pub source: PreviewSource,
    pub session: Option<SessionId>,
    pub snapshot: Option<PreviewSnapshot>,
    /// Set when the preview could not be mounted at all.
    pub mount_error: Option<String>,
}

impl PreviewRow {
    pub fn mounted(
        title: impl Into<String>,
        source: PreviewSource,
        session: SessionId,
        snapshot: Option<PreviewSnapshot>,
    ) -> Self {
        Self {
            title: title.into(),
            source,
            session: Some(session),
            snapshot,
            mount_error: None,
        }
    }

    pub fn failed(title: impl Into<String>, source: PreviewSource, error: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source,
            session: None,
            snapshot: None,
            mount_error: Some(error.into()),
        }
    }
}

pub struct AppState {
    pub should_quit: bool,
    pub tick: u64,

    pub rows: Vec<PreviewRow>,
    pub selected: usize,
    pub scroll_offset: usize,
    /// Whether the pointer is currently over the selected row.
    pub pointer_inside: bool,
    /// Last rendered list area, for mapping mouse positions to rows.
    pub list_area: Rect,

    pub mode: HoverMode,
    pub mobile: bool,
    pub show_help: bool,

    pub toast: Option<Toast>,
    pub status: String,
}

impl AppState {
    pub fn new(mode: HoverMode, mobile: bool) -> Self {
        Self {
            should_quit: false,
            tick: 0,
            rows: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            pointer_inside: false,
            list_area: Rect::default(),
            mode,
            mobile,
            show_help: false,
            toast: None,
            status: String::new(),
        }
    }

    pub fn selected_row(&self) -> Option<&PreviewRow> {
        self.rows.get(self.selected)
    }

    pub fn selected_session(&self) -> Option<SessionId> {
        self.selected_row().and_then(|r| r.session)
    }

    /// Map a terminal cell to a row index inside the list.
    pub fn row_at(&self, column: u16, row: u16) -> Option<usize> {
        let area = self.list_area;
        let inside = column >= area.x
            && column < area.x + area.width
            && row >= area.y
            && row < area.y + area.height;
        if !inside {
            return None;
        }
        let idx = self.scroll_offset + (row - area.y) as usize;
        (idx < self.rows.len()).then_some(idx)
    }

    pub fn update_scroll(&mut self, visible_height: usize) {
        if visible_height == 0 {
            return;
        }
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + visible_height {
            self.scroll_offset = self.selected - visible_height + 1;
        }
    }
}
