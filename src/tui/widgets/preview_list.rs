//! Preview list widget - one row per mounted preview with a state badge

use crate::app::state::{AppState, PreviewRow};
use crate::preview::PreviewState;
use crate::tui::theme::{get_theme, LoadingSpinner, Theme};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};

/// Render the list and remember where it landed for mouse hit-testing.
pub fn render(frame: &mut Frame, state: &mut AppState, area: Rect) {
    let theme = get_theme();
    state.list_area = area;

    if state.rows.is_empty() {
        let empty = Paragraph::new(Line::from("Manifest has no previews"))
            .style(Style::default().fg(theme.palette.fg_secondary));
        frame.render_widget(empty, area);
        return;
    }

    let visible_height = area.height as usize;
    state.update_scroll(visible_height);
    let scroll_offset = state.scroll_offset;

    let items: Vec<ListItem> = state
        .rows
        .iter()
        .enumerate()
        .skip(scroll_offset)
        .take(visible_height)
        .map(|(i, row)| {
            let hovered = i == state.selected && state.pointer_inside;
            let title_style = if hovered {
                Style::default()
                    .fg(theme.palette.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.palette.fg_primary)
            };
            ListItem::new(Line::from(vec![
                badge(row, state.tick, &theme),
                Span::raw(" "),
                Span::styled(row.title.clone(), title_style),
            ]))
        })
        .collect();

    let mut list_state = ListState::default();
    list_state.select(Some(state.selected.saturating_sub(scroll_offset)));

    let list = List::new(items)
        .highlight_style(Style::default().bg(theme.palette.bg_highlight))
        .highlight_symbol(theme.icons.selected);
    frame.render_stateful_widget(list, area, &mut list_state);

    if state.rows.len() > visible_height {
        let pos_text = format!("{}/{}", state.selected + 1, state.rows.len());
        let pos_len = pos_text.len() as u16;
        let pos_x = area.x + area.width.saturating_sub(pos_len);
        if pos_x > area.x {
            frame.render_widget(
                Paragraph::new(pos_text).style(Style::default().fg(theme.palette.fg_secondary)),
                Rect::new(pos_x, area.y, pos_len, 1),
            );
        }
    }
}

fn badge(row: &PreviewRow, tick: u64, theme: &Theme) -> Span<'static> {
    let icons = &theme.icons;
    let dim = Style::default().fg(theme.palette.fg_secondary);
    let Some(snap) = &row.snapshot else {
        return Span::styled(icons.error, Style::default().fg(theme.palette.error));
    };
    match snap.state {
        PreviewState::Idle => Span::styled(icons.idle, dim),
        PreviewState::Resolving | PreviewState::Retrying => {
            Span::styled(LoadingSpinner::frame(tick), dim)
        }
        PreviewState::Ready if snap.playing => {
            Span::styled(icons.play, Style::default().fg(theme.palette.playing))
        }
        PreviewState::Ready => Span::styled(icons.pause, dim),
        PreviewState::PlaybackError => Span::styled(
            icons.error,
            Style::default()
                .fg(theme.palette.error)
                .add_modifier(Modifier::BOLD),
        ),
    }
}
