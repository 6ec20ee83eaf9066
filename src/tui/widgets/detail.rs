//! Detail panel for the focused preview, including the error view

use crate::app::state::{AppState, PreviewRow};
use crate::preview::{
    ErrorCategory, ErrorInfo, HoverSource, Presentation, PreviewSnapshot, Recovery,
};
use crate::tui::theme::{get_theme, Theme};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

pub fn render(frame: &mut Frame, state: &AppState, area: Rect) {
    let theme = get_theme();
    let title = state
        .selected_row()
        .map(|r| format!(" {} ", r.title))
        .unwrap_or_else(|| " Preview ".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(theme.border_set())
        .border_style(Style::default().fg(theme.palette.border))
        .title(title)
        .title_style(Style::default().fg(theme.palette.accent));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = match state.selected_row() {
        None => vec![dim_line("Nothing selected", &theme)],
        Some(row) => row_lines(row, state, &theme),
    };
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn row_lines(row: &PreviewRow, state: &AppState, theme: &Theme) -> Vec<Line<'static>> {
    if let Some(err) = &row.mount_error {
        return vec![
            heading(format!("{} Could not open preview", theme.icons.error), theme),
            Line::default(),
            Line::from(err.clone()),
        ];
    }
    let Some(snap) = &row.snapshot else {
        return vec![dim_line("Waiting for the first update...", theme)];
    };
    if let (Presentation::Error, Some(error)) = (snap.presentation, &snap.error) {
        return error_lines(error, snap.category, snap.retry_count, theme);
    }

    let mut lines = vec![
        field("State", snap.state.label().to_string(), theme),
        field("Showing", presentation_label(snap), theme),
        field("Hover", hover_label(snap.hover), theme),
        field("URL", snap.resolved_url.clone().unwrap_or_else(|| "-".into()), theme),
    ];
    if let Some(poster) = &snap.poster_url {
        lines.push(field("Poster", poster.clone(), theme));
    }
    if snap.retry_count > 0 {
        lines.push(field("Retries", snap.retry_count.to_string(), theme));
    }
    if state.mobile && snap.presentation == Presentation::Poster {
        lines.push(Line::default());
        lines.push(dim_line("Press Enter or click again to play", theme));
    }
    lines
}

/// Message, detail, guidance and the recovery the category calls for.
fn error_lines(
    error: &ErrorInfo,
    category: Option<ErrorCategory>,
    retry_count: u32,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let category = category.unwrap_or(ErrorCategory::Unknown);
    let mut lines = vec![
        heading(format!("{} {}", theme.icons.error, error.message), theme),
        Line::default(),
        Line::from(category.guidance()),
    ];
    if let Some(detail) = &error.detail {
        lines.push(Line::default());
        lines.push(field("Detail", detail.clone(), theme));
    }
    lines.push(field("Kind", category.label().to_string(), theme));
    if retry_count > 0 {
        lines.push(field("Retries", retry_count.to_string(), theme));
    }
    lines.push(Line::default());
    let hint = match category.recovery() {
        Recovery::Reresolve => "r  retry this preview",
        Recovery::ReloadPage => "R  reload every preview",
    };
    lines.push(Line::from(Span::styled(
        hint,
        Style::default()
            .fg(theme.palette.accent_alt)
            .add_modifier(Modifier::BOLD),
    )));
    lines
}

fn presentation_label(snap: &PreviewSnapshot) -> String {
    match snap.presentation {
        Presentation::Placeholder => "placeholder".into(),
        Presentation::Poster => "poster".into(),
        Presentation::Video if snap.playing => "video (playing)".into(),
        Presentation::Video => "video (paused)".into(),
        Presentation::Error => "error".into(),
    }
}

fn hover_label(hover: HoverSource) -> String {
    let on = if hover.is_hovering() { "on" } else { "off" };
    if hover.is_external() {
        format!("{on} (external)")
    } else {
        on.to_string()
    }
}

fn heading(text: String, theme: &Theme) -> Line<'static> {
    Line::from(Span::styled(
        text,
        Style::default()
            .fg(theme.palette.accent)
            .add_modifier(Modifier::BOLD),
    ))
}

fn field(name: &str, value: String, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("{name:9}"),
            Style::default().fg(theme.palette.fg_secondary),
        ),
        Span::styled(value, Style::default().fg(theme.palette.fg_primary)),
    ])
}

fn dim_line(text: &'static str, theme: &Theme) -> Line<'static> {
    Line::from(Span::styled(text, Style::default().fg(theme.palette.fg_secondary)))
}
