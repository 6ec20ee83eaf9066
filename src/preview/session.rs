use super::hover::HoverController;
use super::mobile::{self, MobilePolicy};
use super::{
    Effect, ErrorCategory, ErrorInfo, PreviewOptions, PreviewSnapshot, PreviewState, TimerId,
    TimerIds, TimerKind,
};
use crate::media::MediaReference;
use crate::player::PlayError;
use crate::resolve;

/// Lifecycle of one mounted preview.
///
/// Inputs after [`PreviewSession::unmount`] are dropped. Resolutions carry the
/// generation they were started with and are discarded once superseded.
#[derive(Debug)]
pub struct PreviewSession {
    reference: MediaReference,
    options: PreviewOptions,
    state: PreviewState,
    resolved_url: Option<String>,
    error: Option<ErrorInfo>,
    retry_count: u32,
    auto_retries: u32,
    /// The resolution in flight was started by a retry.
    retrying: bool,
    generation: u64,
    timeout: Option<TimerId>,
    timers: TimerIds,
    hover: HoverController,
    active: bool,
}

impl PreviewSession {
    pub fn new(reference: MediaReference, options: PreviewOptions) -> Self {
        let hover = HoverController::new(&options);
        Self {
            reference,
            options,
            state: PreviewState::Idle,
            resolved_url: None,
            error: None,
            retry_count: 0,
            auto_retries: 0,
            retrying: false,
            generation: 0,
            timeout: None,
            timers: TimerIds::default(),
            hover,
            active: true,
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn reference(&self) -> &MediaReference {
        &self.reference
    }

    pub fn resolved_url(&self) -> Option<&str> {
        self.resolved_url.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn options(&self) -> &PreviewOptions {
        &self.options
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        let playing = self.hover.playback() == super::Playback::Playing;
        PreviewSnapshot {
            state: self.state,
            resolved_url: self.resolved_url.clone(),
            poster_url: self.options.poster_url.clone(),
            hover: self.hover.source(),
            playing,
            error: self.error.clone(),
            category: self.error.as_ref().map(ErrorCategory::classify),
            retry_count: self.retry_count,
            presentation: mobile::presentation(
                self.state,
                playing,
                self.options.poster_url.as_deref(),
            ),
        }
    }

    pub fn mount(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if !self.active || self.state != PreviewState::Idle || self.generation > 0 {
            return fx;
        }
        let muted = self.options.is_mobile
            && MobilePolicy::choose(self.options.poster_url.as_deref())
                == MobilePolicy::MutedAutoplay;
        fx.push(Effect::SetMuted(muted || self.options.muted));

        if self.options.lazy_load && !self.hover.wants_media() {
            tracing::debug!(reference = %self.reference, "deferring load until hover");
            fx.push(Effect::Notify);
            return fx;
        }
        self.begin_resolve(&mut fx);
        fx
    }

    /// Stops everything in flight. Later inputs are ignored.
    pub fn unmount(&mut self) -> Vec<Effect> {
        if !self.active {
            return Vec::new();
        }
        self.active = false;
        self.timeout = None;
        self.hover.teardown();
        let mut fx = vec![Effect::CancelResolve];
        fx.extend(TimerKind::ALL.into_iter().map(Effect::CancelTimer));
        fx.push(Effect::Unload);
        fx
    }

    pub fn set_reference(&mut self, reference: MediaReference) -> Vec<Effect> {
        let mut fx = Vec::new();
        if !self.active || reference == self.reference {
            return fx;
        }
        tracing::debug!(from = %self.reference, to = %reference, "reference changed");
        self.reference = reference;
        self.retry_count = 0;
        self.auto_retries = 0;
        self.retrying = false;
        fx.push(Effect::CancelResolve);
        self.begin_resolve(&mut fx);
        fx
    }

    pub fn resolved(&mut self, generation: u64, result: Result<String, ErrorInfo>) -> Vec<Effect> {
        let mut fx = Vec::new();
        if !self.active {
            return fx;
        }
        if generation != self.generation
            || self.state != PreviewState::Resolving
            || self.resolved_url.is_some()
        {
            tracing::debug!(generation, current = self.generation, "stale resolution dropped");
            return fx;
        }
        match result {
            Ok(url) => self.accept_url(url, &mut fx),
            Err(info) => self.fail(info, &mut fx),
        }
        fx
    }

    pub fn element_can_play(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.active && self.state == PreviewState::Resolving && self.resolved_url.is_some() {
            self.become_ready(&mut fx);
        }
        fx
    }

    pub fn element_error(&mut self, message: &str) -> Vec<Effect> {
        let mut fx = Vec::new();
        let loaded = self.resolved_url.is_some()
            && matches!(self.state, PreviewState::Resolving | PreviewState::Ready);
        if !self.active || !loaded {
            tracing::debug!(%message, "element error outside a load dropped");
            return fx;
        }
        self.fail(ErrorInfo::new(message), &mut fx);
        fx
    }

    pub fn play_failed(&mut self, err: &PlayError) -> Vec<Effect> {
        let mut fx = Vec::new();
        if !self.active {
            return fx;
        }
        self.hover.play_failed();
        match err {
            PlayError::Interrupted => {
                tracing::debug!("play interrupted by pause");
                fx.push(Effect::Notify);
            }
            PlayError::Failed(msg) if self.state == PreviewState::Ready => {
                self.fail(ErrorInfo::new(format!("Playback failed: {msg}")), &mut fx);
            }
            PlayError::Failed(msg) => tracing::debug!(%msg, "play failure outside ready dropped"),
        }
        fx
    }

    pub fn pointer_enter(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.active && self.hover.pointer_enter(&mut self.timers, &mut fx) {
            self.start_deferred(&mut fx);
            fx.push(Effect::Notify);
        }
        fx
    }

    pub fn pointer_leave(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if self.active && self.hover.pointer_leave(&mut self.timers, &mut fx) {
            fx.push(Effect::Notify);
        }
        fx
    }

    pub fn set_external_hover(&mut self, hovering: Option<bool>) -> Vec<Effect> {
        let mut fx = Vec::new();
        if !self.active {
            return fx;
        }
        self.hover.set_external(hovering, &mut fx);
        if hovering == Some(true) {
            self.start_deferred(&mut fx);
        }
        fx.push(Effect::Notify);
        fx
    }

    /// Tap on a mobile poster.
    pub fn activate(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if !self.active || !self.options.is_mobile || self.hover.is_armed() {
            return fx;
        }
        self.hover.arm_autoplay(&mut fx);
        self.start_deferred(&mut fx);
        fx.push(Effect::Notify);
        fx
    }

    pub fn timer_fired(&mut self, id: TimerId) -> Vec<Effect> {
        let mut fx = Vec::new();
        if !self.active {
            return fx;
        }
        if self.timeout == Some(id) {
            self.timeout = None;
            if self.state == PreviewState::Resolving {
                tracing::warn!(reference = %self.reference, "resolution timed out");
                self.fail(ErrorInfo::timeout(self.options.resolve_timeout), &mut fx);
            }
        } else if self.hover.timer_fired(id, &mut fx) {
            fx.push(Effect::Notify);
        }
        fx
    }

    /// Allowed from any mounted state. A deferred session just starts loading.
    pub fn retry(&mut self) -> Vec<Effect> {
        let mut fx = Vec::new();
        if !self.active {
            return fx;
        }
        if self.state == PreviewState::Idle {
            self.start_deferred(&mut fx);
        } else {
            self.start_retry(&mut fx);
        }
        fx
    }

    /// A fresh URL was published for `reference`. Ignored once the session
    /// has moved on to another reference.
    pub fn url_refreshed(&mut self, reference: &MediaReference, url: String) -> Vec<Effect> {
        let mut fx = Vec::new();
        if *reference != self.reference {
            tracing::debug!(stale = %reference, current = %self.reference, "refreshed url for old reference dropped");
            return fx;
        }
        if !self.active || self.resolved_url.as_deref() == Some(url.as_str()) {
            return fx;
        }
        match self.state {
            PreviewState::Ready => {
                tracing::debug!(reference = %self.reference, "swapping in refreshed url");
                self.resolved_url = Some(url.clone());
                fx.push(Effect::Load(url));
                self.hover.replay(&mut fx);
                fx.push(Effect::Notify);
            }
            PreviewState::Resolving if self.resolved_url.is_none() => {
                self.generation += 1;
                fx.push(Effect::CancelResolve);
                self.accept_url(url, &mut fx);
            }
            _ => {}
        }
        fx
    }

    fn transition(&mut self, to: PreviewState, fx: &mut Vec<Effect>) {
        if self.state == to {
            return;
        }
        let from = self.state;
        tracing::debug!(reference = %self.reference, from = from.label(), to = to.label(), "preview state");
        self.state = to;
        fx.push(Effect::Transition { from, to });
    }

    fn start_deferred(&mut self, fx: &mut Vec<Effect>) {
        if self.state == PreviewState::Idle {
            self.begin_resolve(fx);
        }
    }

    fn begin_resolve(&mut self, fx: &mut Vec<Effect>) {
        self.generation += 1;
        self.resolved_url = None;
        self.error = None;
        self.cancel_timeout(fx);
        self.hover.set_ready(false, fx);
        self.transition(PreviewState::Resolving, fx);

        match resolve::resolve_immediate(&self.reference) {
            Some(url) => {
                tracing::debug!(reference = %self.reference, "ephemeral reference used as-is");
                self.accept_url(url, fx);
            }
            None => fx.push(Effect::Resolve {
                generation: self.generation,
                reference: self.reference.clone(),
                preview_mode: self.options.preview_mode,
            }),
        }
        if self.state == PreviewState::Resolving {
            let id = self.timers.next();
            self.timeout = Some(id);
            fx.push(Effect::StartTimer {
                id,
                kind: TimerKind::ResolveTimeout,
                after: self.options.resolve_timeout,
            });
        }
    }

    fn accept_url(&mut self, url: String, fx: &mut Vec<Effect>) {
        tracing::info!(reference = %self.reference, "media url ready");
        self.resolved_url = Some(url.clone());
        fx.push(Effect::Load(url));
        if self.options.await_can_play {
            fx.push(Effect::Notify);
        } else {
            self.become_ready(fx);
        }
    }

    fn become_ready(&mut self, fx: &mut Vec<Effect>) {
        self.cancel_timeout(fx);
        if self.retrying {
            self.retrying = false;
        } else {
            self.retry_count = 0;
            self.auto_retries = 0;
        }
        self.transition(PreviewState::Ready, fx);
        self.hover.set_ready(true, fx);
    }

    fn cancel_timeout(&mut self, fx: &mut Vec<Effect>) {
        if self.timeout.take().is_some() {
            fx.push(Effect::CancelTimer(TimerKind::ResolveTimeout));
        }
    }

    fn fail(&mut self, info: ErrorInfo, fx: &mut Vec<Effect>) {
        self.cancel_timeout(fx);
        if self.state == PreviewState::Resolving && self.resolved_url.is_none() {
            self.generation += 1;
            fx.push(Effect::CancelResolve);
        }
        self.hover.set_ready(false, fx);

        let category = ErrorCategory::classify(&info);
        tracing::warn!(
            reference = %self.reference,
            category = category.label(),
            "preview failed: {info}"
        );
        self.error = Some(info);
        self.retrying = false;
        self.transition(PreviewState::PlaybackError, fx);

        if category.auto_retryable() && self.auto_retries < self.options.max_auto_retries {
            self.auto_retries += 1;
            tracing::info!(reference = %self.reference, attempt = self.auto_retries, "retrying automatically");
            self.start_retry(fx);
        }
    }

    fn start_retry(&mut self, fx: &mut Vec<Effect>) {
        self.retry_count += 1;
        self.retrying = true;
        self.error = None;
        self.transition(PreviewState::Retrying, fx);
        fx.push(Effect::CancelResolve);
        self.begin_resolve(fx);
    }
}
