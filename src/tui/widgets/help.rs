//! Keybinding overlay

use crate::app::state::{AppState, HoverMode};
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
    let icons = &theme.icons;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(theme.border_set())
        .border_style(Style::default().fg(theme.palette.border))
        .title(format!(" {} Keybinds ", icons.help))
        .title_style(Style::default().fg(theme.palette.accent));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let hover = match state.mode {
        HoverMode::Pointer => "Hover after a short delay",
        HoverMode::External => "Set the hover flag",
    };

    let mut content = vec![
        section_header("Navigation", &theme),
        keybind("j / Down", "Next preview", &theme),
        keybind("k / Up", "Previous preview", &theme),
        keybind("g / G", "First / last preview", &theme),
        keybind("mouse", hover, &theme),
        Line::default(),
        section_header("Recovery", &theme),
        keybind("r", "Retry focused preview", &theme),
        keybind("R", "Reload every preview", &theme),
        keybind("f", "Refresh signed URL", &theme),
        keybind("m", "Reload manifest", &theme),
    ];
    if state.mobile {
        content.push(keybind("Enter / click", "Play poster", &theme));
    }
    content.extend([
        Line::default(),
        section_header("General", &theme),
        keybind("?", "Toggle this help", &theme),
        keybind("q / Esc", "Quit", &theme),
    ]);

    frame.render_widget(Paragraph::new(content).wrap(Wrap { trim: false }), inner);
}

fn section_header(title: &str, theme: &Theme) -> Line<'static> {
    Line::from(vec![Span::styled(
        format!("━━ {} ━━", title),
        Style::default()
            .fg(theme.palette.accent)
            .add_modifier(Modifier::BOLD),
    )])
}

fn keybind(key: &str, desc: &str, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled("  ", Style::default()),
        Span::styled(
            format!("{:14}", key),
            Style::default()
                .fg(theme.palette.accent_alt)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc.to_string(), Style::default().fg(theme.palette.fg_primary)),
    ])
}
