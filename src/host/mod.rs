//! Owns the mounted preview sessions and carries out their effects.
//!
//! Everything asynchronous (resolutions, timers, media elements, refresh
//! notifications) reports back through a single [`HostEvent`] channel that
//! the caller drains into [`PreviewHost::handle`].

use crate::bus::RefreshBus;
use crate::media::{HandleRegistry, MediaReference};
use crate::player::{ElementCommand, ElementDriver, ElementEvent, ElementEvents, ElementFactory};
use crate::preview::{
    Effect, ErrorInfo, PreviewOptions, PreviewSession, PreviewSnapshot, TimerId, TimerKind,
};
use crate::resolve::{self, StorageService};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub enum HostEvent {
    Resolved {
        session: SessionId,
        generation: u64,
        result: Result<String, ErrorInfo>,
    },
    Timer {
        session: SessionId,
        timer: TimerId,
    },
    Element {
        session: SessionId,
        event: ElementEvent,
    },
    /// A re-signed URL for `reference`, which may no longer be the
    /// session's reference by the time it arrives.
    UrlRefreshed {
        session: SessionId,
        reference: MediaReference,
        url: String,
    },
    RefreshFailed {
        session: SessionId,
        error: String,
    },
}

impl HostEvent {
    pub fn session(&self) -> SessionId {
        match self {
            HostEvent::Resolved { session, .. }
            | HostEvent::Timer { session, .. }
            | HostEvent::Element { session, .. }
            | HostEvent::UrlRefreshed { session, .. }
            | HostEvent::RefreshFailed { session, .. } => *session,
        }
    }
}

/// Where a preview's media comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewSource {
    Reference(MediaReference),
    /// Played through a `blob:` handle that lives as long as the preview.
    LocalFile(PathBuf),
}

struct Slot {
    session: PreviewSession,
    source: PreviewSource,
    element: ElementDriver,
    resolve: Option<CancellationToken>,
    timers: HashMap<TimerKind, CancellationToken>,
    refresh: Option<CancellationToken>,
    owned_handle: Option<String>,
    watch: watch::Sender<PreviewSnapshot>,
}

impl Slot {
    fn publish(&self) {
        let snap = self.session.snapshot();
        self.watch.send_if_modified(|current| {
            if *current == snap {
                return false;
            }
            *current = snap;
            true
        });
    }

    fn cancel_all(&mut self) {
        if let Some(t) = self.resolve.take() {
            t.cancel();
        }
        for (_, t) in self.timers.drain() {
            t.cancel();
        }
        if let Some(t) = self.refresh.take() {
            t.cancel();
        }
    }
}

pub struct PreviewHost {
    storage: Arc<dyn StorageService>,
    elements: Arc<dyn ElementFactory>,
    handles: HandleRegistry,
    bus: RefreshBus,
    tx: mpsc::Sender<HostEvent>,
    slots: BTreeMap<SessionId, Slot>,
    next_id: u64,
}

impl PreviewHost {
    pub fn new(
        storage: Arc<dyn StorageService>,
        elements: Arc<dyn ElementFactory>,
        handles: HandleRegistry,
        bus: RefreshBus,
    ) -> (Self, mpsc::Receiver<HostEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        let host = Self {
            storage,
            elements,
            handles,
            bus,
            tx,
            slots: BTreeMap::new(),
            next_id: 0,
        };
        (host, rx)
    }

    pub fn mount(
        &mut self,
        source: PreviewSource,
        options: PreviewOptions,
    ) -> anyhow::Result<SessionId> {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.mount_as(id, source, options, None)?;
        Ok(id)
    }

    fn mount_as(
        &mut self,
        id: SessionId,
        source: PreviewSource,
        options: PreviewOptions,
        watch: Option<watch::Sender<PreviewSnapshot>>,
    ) -> anyhow::Result<()> {
        let (reference, owned_handle) = self.reference_for(&source)?;
        let session = PreviewSession::new(reference.clone(), options);
        let snapshot = session.snapshot();
        let watch = match watch {
            Some(w) => {
                w.send_replace(snapshot);
                w
            }
            None => watch::channel(snapshot).0,
        };
        let events = ElementEvents::new(id, self.tx.clone());
        let element = ElementDriver::spawn(self.elements.create(events.clone()), events);

        tracing::info!(session = %id, %reference, "mounting preview");
        let slot = Slot {
            session,
            source,
            element,
            resolve: None,
            timers: HashMap::new(),
            refresh: self.forward_refreshes(id, &reference),
            owned_handle,
            watch,
        };
        self.slots.insert(id, slot);
        self.with_session(id, PreviewSession::mount);
        Ok(())
    }

    fn reference_for(
        &self,
        source: &PreviewSource,
    ) -> anyhow::Result<(MediaReference, Option<String>)> {
        match source {
            PreviewSource::Reference(r) => Ok((r.clone(), None)),
            PreviewSource::LocalFile(path) => {
                let r = self.handles.create(path)?;
                let owned = r.location().to_string();
                Ok((r, Some(owned)))
            }
        }
    }

    /// Tear down a preview. Late results for it are dropped.
    pub fn unmount(&mut self, id: SessionId) -> bool {
        let Some(slot) = self.teardown(id) else {
            return false;
        };
        tracing::info!(session = %id, "unmounted preview");
        drop(slot);
        true
    }

    fn teardown(&mut self, id: SessionId) -> Option<Slot> {
        self.with_session(id, PreviewSession::unmount);
        let mut slot = self.slots.remove(&id)?;
        slot.cancel_all();
        if let Some(handle) = slot.owned_handle.take() {
            self.handles.revoke(&handle);
        }
        Some(slot)
    }

    /// Point a preview at different media.
    pub fn set_source(&mut self, id: SessionId, source: PreviewSource) -> anyhow::Result<bool> {
        let Some(current) = self.slots.get(&id).map(|s| s.source.clone()) else {
            return Ok(false);
        };
        if current == source {
            return Ok(true);
        }
        let (reference, owned_handle) = self.reference_for(&source)?;
        let refresh = self.forward_refreshes(id, &reference);
        let Some(slot) = self.slots.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(t) = std::mem::replace(&mut slot.refresh, refresh) {
            t.cancel();
        }
        let previous = std::mem::replace(&mut slot.owned_handle, owned_handle);
        slot.source = source;
        self.with_session(id, |s| s.set_reference(reference));
        if let Some(handle) = previous {
            self.handles.revoke(&handle);
        }
        Ok(true)
    }

    pub fn pointer_enter(&mut self, id: SessionId) -> bool {
        self.with_session(id, PreviewSession::pointer_enter)
    }

    pub fn pointer_leave(&mut self, id: SessionId) -> bool {
        self.with_session(id, PreviewSession::pointer_leave)
    }

    pub fn set_external_hover(&mut self, id: SessionId, hovering: Option<bool>) -> bool {
        self.with_session(id, |s| s.set_external_hover(hovering))
    }

    pub fn activate(&mut self, id: SessionId) -> bool {
        self.with_session(id, PreviewSession::activate)
    }

    pub fn retry(&mut self, id: SessionId) -> bool {
        self.with_session(id, PreviewSession::retry)
    }

    /// Tear down and remount every preview under its existing id.
    /// Returns the number that came back.
    pub fn reload_all(&mut self) -> usize {
        let ids = self.ids();
        let mut reloaded = 0;
        for id in ids {
            let Some(slot) = self.teardown(id) else {
                continue;
            };
            let options = slot.session.options().clone();
            let Slot { source, watch, .. } = slot;
            match self.mount_as(id, source, options, Some(watch)) {
                Ok(()) => reloaded += 1,
                Err(e) => tracing::warn!(session = %id, "remount failed: {e:#}"),
            }
        }
        tracing::info!(reloaded, "reloaded previews");
        reloaded
    }

    /// Ask storage to re-sign this preview's URL. The new URL arrives through
    /// the refresh bus (and directly, for storage without one).
    pub fn refresh_url(&mut self, id: SessionId) -> bool {
        let Some(slot) = self.slots.get(&id) else {
            return false;
        };
        if slot.session.reference().is_ephemeral() {
            return false;
        }
        let Some(url) = slot.session.resolved_url().map(str::to_string) else {
            return false;
        };
        let reference = slot.session.reference().clone();
        let storage = self.storage.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let event = match storage.force_refresh(&url).await {
                Ok(fresh) => HostEvent::UrlRefreshed {
                    session: id,
                    reference,
                    url: fresh,
                },
                Err(e) => HostEvent::RefreshFailed {
                    session: id,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(event).await;
        });
        true
    }

    /// Feed one event back into its session.
    pub fn handle(&mut self, event: HostEvent) -> bool {
        match event {
            HostEvent::Resolved {
                session,
                generation,
                result,
            } => self.with_session(session, |s| s.resolved(generation, result)),
            HostEvent::Timer { session, timer } => {
                self.with_session(session, |s| s.timer_fired(timer))
            }
            HostEvent::Element { session, event } => match event {
                ElementEvent::CanPlay => self.with_session(session, PreviewSession::element_can_play),
                ElementEvent::Error(msg) => self.with_session(session, |s| s.element_error(&msg)),
                ElementEvent::PlayFailed(e) => self.with_session(session, |s| s.play_failed(&e)),
                ElementEvent::Ended => {
                    tracing::debug!(%session, "media ended");
                    false
                }
            },
            HostEvent::UrlRefreshed {
                session,
                reference,
                url,
            } => self.with_session(session, |s| s.url_refreshed(&reference, url)),
            HostEvent::RefreshFailed { session, error } => {
                tracing::warn!(%session, "url refresh failed: {error}");
                false
            }
        }
    }

    pub fn snapshot(&self, id: SessionId) -> Option<PreviewSnapshot> {
        self.slots.get(&id).map(|s| s.session.snapshot())
    }

    pub fn watch(&self, id: SessionId) -> Option<watch::Receiver<PreviewSnapshot>> {
        self.slots.get(&id).map(|s| s.watch.subscribe())
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.slots.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn shutdown(&mut self) {
        for id in self.ids() {
            self.unmount(id);
        }
    }

    fn with_session(
        &mut self,
        id: SessionId,
        f: impl FnOnce(&mut PreviewSession) -> Vec<Effect>,
    ) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            tracing::trace!(session = %id, "event for unmounted session dropped");
            return false;
        };
        let fx = f(&mut slot.session);
        for effect in fx {
            self.execute(id, effect);
        }
        if let Some(slot) = self.slots.get(&id) {
            slot.publish();
        }
        true
    }

    fn execute(&mut self, id: SessionId, effect: Effect) {
        let Some(slot) = self.slots.get_mut(&id) else {
            return;
        };
        match effect {
            Effect::Transition { .. } | Effect::Notify => {}
            Effect::Resolve {
                generation,
                reference,
                preview_mode,
            } => {
                let token = CancellationToken::new();
                if let Some(old) = slot.resolve.replace(token.clone()) {
                    old.cancel();
                }
                let storage = self.storage.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {
                            tracing::trace!(session = %id, generation, "resolution cancelled");
                        }
                        res = resolve::resolve_reference(storage.as_ref(), &reference, preview_mode) => {
                            let result = res.map_err(|e| ErrorInfo::from_storage(&e));
                            let _ = tx.send(HostEvent::Resolved { session: id, generation, result }).await;
                        }
                    }
                });
            }
            Effect::CancelResolve => {
                if let Some(t) = slot.resolve.take() {
                    t.cancel();
                }
            }
            Effect::StartTimer { id: timer, kind, after } => {
                let token = CancellationToken::new();
                if let Some(old) = slot.timers.insert(kind, token.clone()) {
                    old.cancel();
                }
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = tokio::time::sleep(after) => {
                            let _ = tx.send(HostEvent::Timer { session: id, timer }).await;
                        }
                    }
                });
            }
            Effect::CancelTimer(kind) => {
                if let Some(t) = slot.timers.remove(&kind) {
                    t.cancel();
                }
            }
            Effect::Load(url) => slot.element.send(ElementCommand::Load(url)),
            Effect::Play => slot.element.send(ElementCommand::Play),
            Effect::Pause { rewind } => slot.element.send(ElementCommand::Pause { rewind }),
            Effect::SetMuted(muted) => slot.element.send(ElementCommand::SetMuted(muted)),
            Effect::Unload => slot.element.send(ElementCommand::Unload),
        }
    }

    fn forward_refreshes(
        &self,
        id: SessionId,
        reference: &MediaReference,
    ) -> Option<CancellationToken> {
        if reference.is_ephemeral() {
            return None;
        }
        let mut sub = self.bus.subscribe(reference.location());
        tracing::debug!(session = %id, topics = self.bus.topics(), "watching url refreshes");
        let token = CancellationToken::new();
        let stop = token.clone();
        let tx = self.tx.clone();
        let reference = reference.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    msg = sub.recv() => match msg {
                        Ok(url) => {
                            let event = HostEvent::UrlRefreshed {
                                session: id,
                                reference: reference.clone(),
                                url,
                            };
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::debug!(session = %id, skipped = n, "refresh notifications skipped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
        Some(token)
    }
}

impl Drop for PreviewHost {
    fn drop(&mut self) {
        for slot in self.slots.values_mut() {
            slot.cancel_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{MediaElement, PlayError};
    use crate::preview::{ErrorCategory, PreviewState};
    use crate::resolve::CachingStorage;
    use crate::resolve::testing::FakeStorage;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    type CommandLog = Arc<Mutex<Vec<(SessionId, ElementCommand)>>>;

    struct RecordingElement {
        events: ElementEvents,
        log: CommandLog,
    }

    impl RecordingElement {
        fn record(&self, cmd: ElementCommand) {
            self.log.lock().push((self.events.session(), cmd));
        }
    }

    #[async_trait]
    impl MediaElement for RecordingElement {
        async fn load(&mut self, url: &str) -> anyhow::Result<()> {
            self.record(ElementCommand::Load(url.to_string()));
            self.events.send(ElementEvent::CanPlay).await;
            Ok(())
        }

        async fn play(&mut self) -> Result<(), PlayError> {
            self.record(ElementCommand::Play);
            Ok(())
        }

        async fn pause(&mut self, rewind: bool) -> anyhow::Result<()> {
            self.record(ElementCommand::Pause { rewind });
            Ok(())
        }

        async fn set_muted(&mut self, muted: bool) -> anyhow::Result<()> {
            self.record(ElementCommand::SetMuted(muted));
            Ok(())
        }

        async fn unload(&mut self) -> anyhow::Result<()> {
            self.record(ElementCommand::Unload);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        log: CommandLog,
    }

    impl ElementFactory for RecordingFactory {
        fn create(&self, events: ElementEvents) -> Box<dyn MediaElement> {
            Box::new(RecordingElement {
                events,
                log: self.log.clone(),
            })
        }
    }

    struct Harness {
        host: PreviewHost,
        rx: mpsc::Receiver<HostEvent>,
        log: CommandLog,
        handles: HandleRegistry,
    }

    impl Harness {
        fn new(storage: Arc<dyn StorageService>) -> Self {
            Self::with_bus(storage, RefreshBus::new())
        }

        fn with_bus(storage: Arc<dyn StorageService>, bus: RefreshBus) -> Self {
            let factory = RecordingFactory::default();
            let log = factory.log.clone();
            let handles = HandleRegistry::new();
            let (host, rx) = PreviewHost::new(storage, Arc::new(factory), handles.clone(), bus);
            Self {
                host,
                rx,
                log,
                handles,
            }
        }

        /// Handle every event that arrives without a timer firing.
        async fn settle(&mut self) {
            while let Ok(Some(ev)) =
                tokio::time::timeout(Duration::from_millis(1), self.rx.recv()).await
            {
                self.host.handle(ev);
            }
        }

        fn plays(&self, id: SessionId) -> usize {
            self.log
                .lock()
                .iter()
                .filter(|(s, c)| *s == id && *c == ElementCommand::Play)
                .count()
        }

        fn state(&self, id: SessionId) -> PreviewState {
            self.host.snapshot(id).unwrap().state
        }
    }

    fn opts() -> PreviewOptions {
        PreviewOptions {
            hover_enter_delay: Duration::from_millis(50),
            hover_leave_delay: Duration::ZERO,
            resolve_timeout: Duration::from_secs(1),
            ..PreviewOptions::default()
        }
    }

    fn reference(location: &str) -> PreviewSource {
        PreviewSource::Reference(MediaReference::parse(location))
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_resolves_and_loads() {
        let fake = FakeStorage::with("media-42", "https://cdn/ex.mp4");
        let mut h = Harness::new(Arc::new(fake.clone()));
        let id = h.host.mount(reference("media-42"), opts()).unwrap();
        let mut watch = h.host.watch(id).unwrap();
        h.settle().await;

        let snap = h.host.snapshot(id).unwrap();
        assert_eq!(snap.state, PreviewState::Ready);
        assert_eq!(snap.resolved_url.as_deref(), Some("https://cdn/ex.mp4"));
        assert_eq!(watch.borrow_and_update().state, PreviewState::Ready);
        assert!(h
            .log
            .lock()
            .contains(&(id, ElementCommand::Load("https://cdn/ex.mp4".into()))));
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_drops_late_resolution() {
        let fake = FakeStorage {
            delay: Some(Duration::from_millis(100)),
            ..FakeStorage::with("media-42", "https://cdn/ex.mp4")
        };
        let mut h = Harness::new(Arc::new(fake));
        let id = h.host.mount(reference("media-42"), opts()).unwrap();
        let watch = h.host.watch(id).unwrap();
        assert!(h.host.unmount(id));

        tokio::time::sleep(Duration::from_millis(200)).await;
        h.settle().await;
        assert!(h.host.snapshot(id).is_none());
        assert_eq!(watch.borrow().state, PreviewState::Resolving);
        assert!(!h.host.retry(id));
        assert!(h.log.lock().contains(&(id, ElementCommand::Unload)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_file_uses_handle_and_revokes_it() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"x").unwrap();

        let fake = FakeStorage::default();
        let mut h = Harness::new(Arc::new(fake.clone()));
        let id = h
            .host
            .mount(PreviewSource::LocalFile(file), opts())
            .unwrap();
        h.settle().await;

        let snap = h.host.snapshot(id).unwrap();
        assert_eq!(snap.state, PreviewState::Ready);
        assert!(snap.resolved_url.unwrap().starts_with("blob:"));
        assert_eq!(fake.calls(), 0);
        assert_eq!(h.handles.len(), 1);

        h.host.unmount(id);
        assert!(h.handles.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_hover_does_not_play() {
        let fake = FakeStorage::with("media-42", "https://cdn/ex.mp4");
        let mut h = Harness::new(Arc::new(fake));
        let id = h.host.mount(reference("media-42"), opts()).unwrap();
        h.settle().await;

        h.host.pointer_enter(id);
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.host.pointer_leave(id);
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.settle().await;
        assert_eq!(h.plays(id), 0);

        h.host.pointer_enter(id);
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.settle().await;
        assert_eq!(h.plays(id), 1);
        assert!(h.host.snapshot(id).unwrap().playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_retries_once_then_surfaces() {
        let fake = FakeStorage {
            delay: Some(Duration::from_secs(30)),
            ..FakeStorage::with("media-42", "https://cdn/ex.mp4")
        };
        let mut h = Harness::new(Arc::new(fake.clone()));
        let id = h.host.mount(reference("media-42"), opts()).unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        h.settle().await;
        let snap = h.host.snapshot(id).unwrap();
        assert_eq!(snap.state, PreviewState::Resolving);
        assert_eq!(snap.retry_count, 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        h.settle().await;
        let snap = h.host.snapshot(id).unwrap();
        assert_eq!(snap.state, PreviewState::PlaybackError);
        assert_eq!(snap.category, Some(ErrorCategory::BackendFetchFailure));
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_element_error_then_retry() {
        let fake = FakeStorage::with("media-42", "https://cdn/ex.mp4");
        let mut h = Harness::new(Arc::new(fake));
        let id = h.host.mount(reference("media-42"), opts()).unwrap();
        h.settle().await;

        h.host.handle(HostEvent::Element {
            session: id,
            event: ElementEvent::Error("decode error".into()),
        });
        assert_eq!(h.state(id), PreviewState::PlaybackError);

        assert!(h.host.retry(id));
        h.settle().await;
        let snap = h.host.snapshot(id).unwrap();
        assert_eq!(snap.state, PreviewState::Ready);
        assert_eq!(snap.retry_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_reference_reports_backend_failure() {
        let mut h = Harness::new(Arc::new(FakeStorage::default()));
        let id = h.host.mount(reference("media-404"), PreviewOptions {
            max_auto_retries: 0,
            ..opts()
        })
        .unwrap();
        h.settle().await;

        let snap = h.host.snapshot(id).unwrap();
        assert_eq!(snap.state, PreviewState::PlaybackError);
        assert_eq!(snap.category, Some(ErrorCategory::BackendFetchFailure));
        let error = snap.error.unwrap();
        assert!(error.message.starts_with("Failed to load video"));
        assert!(error.detail.unwrap().contains("could not be loaded from database"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_reaches_every_preview_of_reference() {
        let fake = FakeStorage::with("media-42", "https://cdn/old.mp4");
        fake.refreshes
            .lock()
            .insert("https://cdn/old.mp4".into(), "https://cdn/new.mp4".into());
        let bus = RefreshBus::new();
        let storage = CachingStorage::new(fake, bus.clone(), &Default::default());
        let mut h = Harness::with_bus(Arc::new(storage), bus);

        let a = h.host.mount(reference("media-42"), opts()).unwrap();
        let b = h.host.mount(reference("media-42"), opts()).unwrap();
        h.settle().await;

        assert!(h.host.refresh_url(a));
        h.settle().await;
        for id in [a, b] {
            assert_eq!(
                h.host.snapshot(id).unwrap().resolved_url.as_deref(),
                Some("https://cdn/new.mp4")
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_all_keeps_ids() {
        let fake = FakeStorage::with("media-42", "https://cdn/ex.mp4");
        let mut h = Harness::new(Arc::new(fake.clone()));
        let id = h.host.mount(reference("media-42"), opts()).unwrap();
        let mut watch = h.host.watch(id).unwrap();
        h.settle().await;
        h.host.handle(HostEvent::Element {
            session: id,
            event: ElementEvent::Error("request blocked by client".into()),
        });
        assert_eq!(h.state(id), PreviewState::PlaybackError);

        assert_eq!(h.host.reload_all(), 1);
        h.settle().await;
        assert_eq!(h.host.ids(), vec![id]);
        assert_eq!(h.state(id), PreviewState::Ready);
        assert_eq!(watch.borrow_and_update().state, PreviewState::Ready);
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_source_switches_media() {
        let fake = FakeStorage::with("media-1", "https://cdn/one.mp4");
        fake.answer("media-2", Ok("https://cdn/two.mp4".into()));
        let mut h = Harness::new(Arc::new(fake));
        let id = h.host.mount(reference("media-1"), opts()).unwrap();
        h.settle().await;

        assert!(h.host.set_source(id, reference("media-2")).unwrap());
        h.settle().await;
        assert_eq!(
            h.host.snapshot(id).unwrap().resolved_url.as_deref(),
            Some("https://cdn/two.mp4")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_for_replaced_source_is_ignored() {
        let fake = FakeStorage::with("media-1", "https://cdn/one.mp4");
        fake.answer("media-2", Ok("https://cdn/two.mp4".into()));
        fake.refreshes
            .lock()
            .insert("https://cdn/one.mp4".into(), "https://cdn/one-fresh.mp4".into());
        let mut h = Harness::new(Arc::new(fake));
        let id = h.host.mount(reference("media-1"), opts()).unwrap();
        h.settle().await;
        assert_eq!(h.state(id), PreviewState::Ready);

        assert!(h.host.refresh_url(id));
        assert!(h.host.set_source(id, reference("media-2")).unwrap());

        let mut pending = Vec::new();
        while let Ok(Some(ev)) =
            tokio::time::timeout(Duration::from_millis(1), h.rx.recv()).await
        {
            pending.push(ev);
        }
        // The old reference's refresh lands before the new resolution.
        let (refreshed, rest): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|ev| matches!(ev, HostEvent::UrlRefreshed { .. }));
        assert_eq!(refreshed.len(), 1);
        for ev in refreshed.into_iter().chain(rest) {
            h.host.handle(ev);
        }
        h.settle().await;

        let snap = h.host.snapshot(id).unwrap();
        assert_eq!(snap.state, PreviewState::Ready);
        assert_eq!(snap.resolved_url.as_deref(), Some("https://cdn/two.mp4"));
    }
}
