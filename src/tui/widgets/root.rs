//! Root layout widget

use crate::app::state::{AppState, ToastKind};
use crate::config::Config;
use crate::preview::PreviewState;
use crate::tui::theme::get_theme;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear},
    Frame,
};

use super::{detail, help, preview_list};

/// ┌─ curator ───────────────────────────────────────────┐
/// │ ⠋ teaser          │  State    ready                  │
/// │   draft.mp4       │  Showing  video (playing)        │
/// │   broken.mp4      │  ...                             │
/// └───────────────────┴──────────────────────────────────┘
///  status / toast                                ? help
pub fn render(frame: &mut Frame, cfg: &Config, state: &mut AppState) {
    let root = frame.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)])
        .split(root);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[0]);

    render_list_panel(frame, cfg, state, cols[0]);
    detail::render(frame, state, cols[1]);
    render_status_line(frame, state, rows[1]);

    if state.show_help {
        let area = centered(root, 60, 16);
        frame.render_widget(Clear, area);
        help::render(frame, state, area);
    }
}

fn render_list_panel(frame: &mut Frame, cfg: &Config, state: &mut AppState, area: Rect) {
    let theme = get_theme();
    let mut flags = vec![state.mode.label().to_string()];
    if state.mobile {
        flags.push("mobile".into());
    }
    if cfg.preview.lazy_load {
        flags.push("lazy".into());
    }
    let title = format!(" {} Previews [{}] ", theme.icons.video, flags.join(", "));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(theme.border_set())
        .border_style(Style::default().fg(theme.palette.border))
        .title(title)
        .title_style(Style::default().fg(theme.palette.accent));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    preview_list::render(frame, state, inner);
}

fn render_status_line(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = get_theme();
    let icons = &theme.icons;

    let left = match &state.toast {
        Some(toast) => {
            let icon = match toast.kind {
                ToastKind::Success => icons.success,
                ToastKind::Error => icons.error,
            };
            Span::styled(
                format!(" {icon} {}", toast.message),
                Style::default()
                    .fg(theme.palette.accent)
                    .add_modifier(Modifier::BOLD),
            )
        }
        None => {
            let errors = state
                .rows
                .iter()
                .filter(|r| {
                    r.mount_error.is_some()
                        || r.snapshot
                            .as_ref()
                            .is_some_and(|s| s.state == PreviewState::PlaybackError)
                })
                .count();
            let text = if errors > 0 {
                format!(" {}  {} {errors} failed", state.status, icons.bullet)
            } else {
                format!(" {}", state.status)
            };
            Span::styled(text, Style::default().fg(theme.palette.fg_secondary))
        }
    };

    let hint = format!("{} ? help ", icons.help);
    let hint_len = hint.chars().count() as u16;
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(hint_len)])
        .split(area);

    frame.render_widget(Line::from(left), cols[0]);
    frame.render_widget(
        Line::from(Span::styled(hint, Style::default().fg(theme.palette.fg_secondary))),
        cols[1],
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}
