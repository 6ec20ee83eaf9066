use crate::app::actions::Action;
use crate::app::events::{Event, InputEvent};
use crate::app::state::AppState;
use crossterm::event::{
    self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent,
    MouseEventKind,
};
use tokio::sync::mpsc;

pub fn spawn_input_task(tx: mpsc::Sender<Event>, mouse_enabled: bool) {
    tokio::task::spawn_blocking(move || {
        loop {
            if event::poll(std::time::Duration::from_millis(250)).unwrap_or(false) {
                let ev = match event::read() {
                    Ok(CtEvent::Key(k)) if k.kind == KeyEventKind::Press => InputEvent::Key(k),
                    Ok(CtEvent::Mouse(m)) if mouse_enabled => InputEvent::Mouse(m),
                    Ok(CtEvent::Resize(_, _)) => InputEvent::Resize,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!("terminal read failed: {e}");
                        continue;
                    }
                };
                if tx.blocking_send(Event::Input(ev)).is_err() {
                    break;
                }
            } else if tx.is_closed() {
                break;
            }
        }
    });
}

pub fn map_input_to_action(state: &AppState, ev: InputEvent) -> Option<Action> {
    match ev {
        InputEvent::Resize => Some(Action::Resize),
        InputEvent::Mouse(m) => map_mouse(state, m),
        InputEvent::Key(k) if state.show_help => match k.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Esc | KeyCode::Char('?') => Some(Action::ToggleHelp),
            _ => None,
        },
        InputEvent::Key(k) => map_key(k),
    }
}

fn map_mouse(state: &AppState, m: MouseEvent) -> Option<Action> {
    match m.kind {
        MouseEventKind::Moved => match state.row_at(m.column, m.row) {
            Some(idx) if idx == state.selected && state.pointer_inside => None,
            Some(idx) => Some(Action::PointerAt(idx)),
            None if state.pointer_inside => Some(Action::PointerOut),
            None => None,
        },
        MouseEventKind::Down(MouseButton::Left) => {
            let idx = state.row_at(m.column, m.row)?;
            if idx != state.selected || !state.pointer_inside {
                Some(Action::PointerAt(idx))
            } else if state.mobile {
                Some(Action::Activate)
            } else {
                None
            }
        }
        MouseEventKind::ScrollUp => Some(Action::ListUp),
        MouseEventKind::ScrollDown => Some(Action::ListDown),
        _ => None,
    }
}

fn map_key(k: KeyEvent) -> Option<Action> {
    match k.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::ListUp),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::ListDown),
        KeyCode::Char('g') | KeyCode::Home => Some(Action::GoTop),
        KeyCode::Char('G') | KeyCode::End => Some(Action::GoBottom),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Action::Activate),
        KeyCode::Char('r') => Some(Action::Retry),
        KeyCode::Char('R') => Some(Action::ReloadAll),
        KeyCode::Char('f') => Some(Action::RefreshUrl),
        KeyCode::Char('m') => Some(Action::ReloadManifest),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        _ => None,
    }
}
