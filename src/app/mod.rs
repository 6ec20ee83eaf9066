pub mod actions;
pub mod events;
pub mod state;

use crate::config::Config;
use crate::host::{HostEvent, PreviewHost, SessionId};
use crate::input;
use crate::manifest::{Manifest, PreviewItem};
use crate::preview::PreviewOptions;
use crate::tui::{self, TuiTerminal};
use actions::Action;
use events::Event;
use state::{AppState, HoverMode, PreviewRow, Toast};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Redraw cadence for spinners and toast expiry.
const TICK: Duration = Duration::from_millis(200);

pub struct App {
    cfg: Config,
    state: AppState,
    host: PreviewHost,
    host_rx: mpsc::Receiver<HostEvent>,
    manifest: Option<PathBuf>,
}

impl App {
    pub fn new(
        cfg: Config,
        host: PreviewHost,
        host_rx: mpsc::Receiver<HostEvent>,
        mode: HoverMode,
        mobile: bool,
    ) -> Self {
        Self {
            cfg,
            state: AppState::new(mode, mobile),
            host,
            host_rx,
            manifest: None,
        }
    }

    /// Remember where the items came from so they can be reloaded.
    pub fn with_manifest(mut self, path: PathBuf) -> Self {
        self.manifest = Some(path);
        self
    }

    /// Mount one preview per item. Items that fail to mount stay listed with
    /// their error.
    pub fn mount_items(&mut self, items: Vec<PreviewItem>) {
        for item in items {
            let row = self.mount_row(item);
            self.state.rows.push(row);
        }
        self.state.status = format!(
            "{} previews, {} mounted",
            self.state.rows.len(),
            self.host.len()
        );
    }

    fn mount_row(&mut self, item: PreviewItem) -> PreviewRow {
        let options = self.options_for(&item);
        match self.host.mount(item.source.clone(), options) {
            Ok(id) => {
                let snapshot = self.host.snapshot(id);
                PreviewRow::mounted(item.title, item.source, id, snapshot)
            }
            Err(e) => {
                tracing::warn!(title = %item.title, "could not mount preview: {e:#}");
                PreviewRow::failed(item.title, item.source, format!("{e:#}"))
            }
        }
    }

    /// Re-read the manifest. Rows keep their position; a changed source is
    /// swapped into the existing preview, extra rows are mounted and missing
    /// ones unmounted.
    fn reload_manifest(&mut self) {
        let Some(path) = self.manifest.clone() else {
            self.state.toast = Some(Toast::error("No manifest to reload"));
            return;
        };
        let items = match Manifest::load(&path)
            .and_then(|m| m.items(path.parent().unwrap_or(Path::new("."))))
        {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("manifest reload failed: {e:#}");
                self.state.toast = Some(Toast::error(format!("{e:#}")));
                return;
            }
        };
        self.apply_items(items);
    }

    fn apply_items(&mut self, items: Vec<PreviewItem>) {
        let mut changed = 0;
        for row in self.state.rows.drain(items.len().min(self.state.rows.len())..) {
            if let Some(id) = row.session {
                self.host.unmount(id);
            }
            changed += 1;
        }
        for (i, item) in items.into_iter().enumerate() {
            let Some(row) = self.state.rows.get_mut(i) else {
                let row = self.mount_row(item);
                self.state.rows.push(row);
                changed += 1;
                continue;
            };
            row.title = item.title.clone();
            if row.source == item.source {
                continue;
            }
            changed += 1;
            let swapped = match row.session {
                Some(id) => self.host.set_source(id, item.source.clone()),
                None => Ok(false),
            };
            match swapped {
                Ok(true) => {
                    row.source = item.source;
                    row.mount_error = None;
                }
                Ok(false) => {
                    let fresh = self.mount_row(item);
                    self.state.rows[i] = fresh;
                }
                Err(e) => row.mount_error = Some(format!("{e:#}")),
            }
        }
        self.state.selected = self.state.selected.min(self.state.rows.len().saturating_sub(1));
        self.sync_all();
        self.state.toast = Some(Toast::success(format!("Manifest reloaded, {changed} changed")));
    }

    fn options_for(&self, item: &PreviewItem) -> PreviewOptions {
        let external = match self.state.mode {
            HoverMode::Pointer => None,
            HoverMode::External => Some(false),
        };
        PreviewOptions::from_config(&self.cfg.preview, &self.cfg.player)
            .with_poster(item.poster.clone())
            .mobile(self.state.mobile)
            .external_hover(external)
    }

    pub async fn run(&mut self, terminal: &mut TuiTerminal) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::channel::<Event>(256);
        input::spawn_input_task(tx, self.cfg.input.mouse);
        let mut ticker = tokio::time::interval(TICK);

        tui::draw(terminal, &self.cfg, &mut self.state)?;

        loop {
            tokio::select! {
                ev = rx.recv() => {
                    let Some(Event::Input(input_ev)) = ev else { break };
                    if let Some(action) = input::map_input_to_action(&self.state, input_ev) {
                        self.handle_action(action);
                    }
                }
                Some(host_ev) = self.host_rx.recv() => self.on_host_event(host_ev),
                _ = ticker.tick() => self.state.tick = self.state.tick.wrapping_add(1),
            }

            if self.state.should_quit {
                break;
            }
            tui::draw(terminal, &self.cfg, &mut self.state)?;
        }

        self.host.shutdown();
        Ok(())
    }

    pub fn on_host_event(&mut self, ev: HostEvent) {
        match &ev {
            HostEvent::RefreshFailed { error, .. } => {
                self.state.toast = Some(Toast::error(format!("Refresh failed: {error}")));
            }
            HostEvent::UrlRefreshed { session, .. }
                if Some(*session) == self.state.selected_session() =>
            {
                self.state.toast = Some(Toast::success("URL refreshed"));
            }
            _ => {}
        }
        let session = ev.session();
        if self.host.handle(ev) {
            self.sync_row(session);
        }
    }

    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.state.should_quit = true,
            Action::ListUp => self.focus(self.state.selected.saturating_sub(1)),
            Action::ListDown => self.focus(self.state.selected + 1),
            Action::GoTop => self.focus(0),
            Action::GoBottom => self.focus(self.state.rows.len().saturating_sub(1)),
            Action::PointerAt(i) => self.focus(i),
            Action::PointerOut => self.pointer_out(),
            Action::Activate => {
                if !self.state.mobile {
                    self.state.status = "Tap to play only applies to the mobile layout".into();
                } else if let Some(id) = self.state.selected_session() {
                    self.host.activate(id);
                    self.sync_row(id);
                }
            }
            Action::Retry => {
                if let Some(id) = self.state.selected_session() {
                    self.host.retry(id);
                    self.sync_row(id);
                }
            }
            Action::ReloadAll => self.reload_all(),
            Action::RefreshUrl => self.refresh_url(),
            Action::ReloadManifest => self.reload_manifest(),
            Action::ToggleHelp => self.state.show_help = !self.state.show_help,
            Action::Resize => {}
        }
    }

    /// Move hover to row `idx`, leaving the previous row first.
    fn focus(&mut self, idx: usize) {
        if self.state.rows.is_empty() {
            return;
        }
        let idx = idx.min(self.state.rows.len() - 1);
        if idx == self.state.selected && self.state.pointer_inside {
            return;
        }
        if self.state.pointer_inside && idx != self.state.selected {
            self.hover(self.state.selected, false);
        }
        self.state.selected = idx;
        self.state.pointer_inside = true;
        self.hover(idx, true);
    }

    fn pointer_out(&mut self) {
        if !self.state.pointer_inside {
            return;
        }
        self.state.pointer_inside = false;
        self.hover(self.state.selected, false);
    }

    fn hover(&mut self, idx: usize, hovering: bool) {
        let Some(id) = self.state.rows.get(idx).and_then(|r| r.session) else {
            return;
        };
        match self.state.mode {
            HoverMode::Pointer if hovering => self.host.pointer_enter(id),
            HoverMode::Pointer => self.host.pointer_leave(id),
            HoverMode::External => self.host.set_external_hover(id, Some(hovering)),
        };
        self.sync_row(id);
    }

    fn reload_all(&mut self) {
        let reloaded = self.host.reload_all();
        let inside = self.state.pointer_inside;
        self.state.pointer_inside = false;
        if inside {
            self.focus(self.state.selected);
        }
        self.sync_all();
        self.state.toast = Some(Toast::success(format!("Reloaded {reloaded} previews")));
    }

    fn refresh_url(&mut self) {
        let Some(id) = self.state.selected_session() else {
            return;
        };
        if self.host.refresh_url(id) {
            self.state.status = "Refreshing URL...".into();
        } else {
            self.state.toast = Some(Toast::error("Nothing to refresh for this preview"));
        }
    }

    fn sync_row(&mut self, id: SessionId) {
        let snapshot = self.host.snapshot(id);
        for row in self.state.rows.iter_mut().filter(|r| r.session == Some(id)) {
            if let Some(snap) = &snapshot
                && let Some(prev) = &row.snapshot
                && prev.state != snap.state
            {
                tracing::debug!(session = %id, from = prev.state.label(), to = snap.state.label(), "row state");
            }
            row.snapshot = snapshot.clone();
        }
    }

    fn sync_all(&mut self) {
        let ids: Vec<SessionId> = self.state.rows.iter().filter_map(|r| r.session).collect();
        for id in ids {
            self.sync_row(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RefreshBus;
    use crate::host::PreviewSource;
    use crate::media::{HandleRegistry, MediaReference};
    use crate::player::NullFactory;
    use crate::preview::{PreviewState, Recovery};
    use crate::resolve::testing::FakeStorage;
    use std::sync::Arc;

    fn app(fake: FakeStorage, mode: HoverMode, mobile: bool) -> App {
        let mut cfg = Config::default();
        cfg.preview.hover_enter_delay_ms = 0;
        let (host, rx) = PreviewHost::new(
            Arc::new(fake),
            Arc::new(NullFactory),
            HandleRegistry::new(),
            RefreshBus::new(),
        );
        App::new(cfg, host, rx, mode, mobile)
    }

    fn items(locations: &[&str]) -> Vec<PreviewItem> {
        locations
            .iter()
            .map(|l| PreviewItem {
                title: l.to_string(),
                source: PreviewSource::Reference(MediaReference::parse(*l)),
                poster: None,
            })
            .collect()
    }

    async fn settle(app: &mut App) {
        while let Ok(Some(ev)) =
            tokio::time::timeout(Duration::from_millis(1), app.host_rx.recv()).await
        {
            app.on_host_event(ev);
        }
    }

    fn state_of(app: &App, idx: usize) -> PreviewState {
        app.state.rows[idx].snapshot.as_ref().unwrap().state
    }

    fn playing(app: &App, idx: usize) -> bool {
        app.state.rows[idx].snapshot.as_ref().unwrap().playing
    }

    #[tokio::test(start_paused = true)]
    async fn test_rows_follow_host() {
        let fake = FakeStorage::with("a", "https://cdn/a.mp4");
        let mut app = app(fake, HoverMode::Pointer, false);
        app.mount_items(items(&["a", "missing"]));
        assert_eq!(state_of(&app, 0), PreviewState::Resolving);
        settle(&mut app).await;

        assert_eq!(state_of(&app, 0), PreviewState::Ready);
        assert_eq!(state_of(&app, 1), PreviewState::PlaybackError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moving_focus_moves_playback() {
        let fake = FakeStorage::with("a", "https://cdn/a.mp4");
        fake.answer("b", Ok("https://cdn/b.mp4".into()));
        let mut app = app(fake, HoverMode::Pointer, false);
        app.mount_items(items(&["a", "b"]));
        settle(&mut app).await;

        app.handle_action(Action::PointerAt(0));
        assert!(playing(&app, 0));
        app.handle_action(Action::ListDown);
        assert!(!playing(&app, 0));
        assert!(playing(&app, 1));

        app.handle_action(Action::PointerOut);
        assert!(!playing(&app, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_mode_drives_flag() {
        let fake = FakeStorage::with("a", "https://cdn/a.mp4");
        let mut app = app(fake, HoverMode::External, false);
        app.mount_items(items(&["a"]));
        settle(&mut app).await;

        app.handle_action(Action::GoTop);
        let snap = app.state.rows[0].snapshot.clone().unwrap();
        assert_eq!(snap.hover, crate::preview::HoverSource::External(true));
        assert!(snap.playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_row() {
        let fake = FakeStorage::default();
        let mut app = app(fake.clone(), HoverMode::Pointer, false);
        app.mount_items(items(&["late"]));
        settle(&mut app).await;
        assert_eq!(state_of(&app, 0), PreviewState::PlaybackError);
        let snap = app.state.rows[0].snapshot.clone().unwrap();
        assert_eq!(snap.category.map(|c| c.recovery()), Some(Recovery::Reresolve));

        fake.answer("late", Ok("https://cdn/late.mp4".into()));
        app.handle_action(Action::Retry);
        settle(&mut app).await;
        assert_eq!(state_of(&app, 0), PreviewState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activate_only_on_mobile() {
        let fake = FakeStorage::with("a", "https://cdn/a.mp4");
        let mut app = app(fake, HoverMode::Pointer, false);
        app.mount_items(items(&["a"]));
        settle(&mut app).await;
        app.handle_action(Action::Activate);
        assert!(!playing(&app, 0));
        assert!(app.state.status.contains("mobile"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmountable_item_is_listed() {
        let fake = FakeStorage::default();
        let mut app = app(fake, HoverMode::Pointer, false);
        app.mount_items(vec![PreviewItem {
            title: "gone".into(),
            source: PreviewSource::LocalFile("/nonexistent/clip.mp4".into()),
            poster: None,
        }]);
        let row = &app.state.rows[0];
        assert!(row.session.is_none());
        assert!(row.mount_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manifest_reload_swaps_sources_in_place() {
        let fake = FakeStorage::with("a", "https://cdn/a.mp4");
        fake.answer("b", Ok("https://cdn/b.mp4".into()));
        fake.answer("b2", Ok("https://cdn/b2.mp4".into()));
        let mut app = app(fake, HoverMode::Pointer, false);
        app.mount_items(items(&["a", "b", "c"]));
        settle(&mut app).await;
        let before = app.state.rows[1].session;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("previews.toml");
        std::fs::write(
            &path,
            "[[item]]\nlocation = \"a\"\n\n[[item]]\ntitle = \"B\"\nlocation = \"b2\"\n",
        )
        .unwrap();
        app.manifest = Some(path);
        app.handle_action(Action::ReloadManifest);
        settle(&mut app).await;

        assert_eq!(app.state.rows.len(), 2);
        assert_eq!(app.host.len(), 2);
        let row = &app.state.rows[1];
        assert_eq!(row.title, "B");
        assert_eq!(row.session, before);
        assert_eq!(
            row.snapshot.as_ref().unwrap().resolved_url.as_deref(),
            Some("https://cdn/b2.mp4")
        );
    }
}
