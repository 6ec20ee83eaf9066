//! Hover arbitration and play/pause reconciliation.

use super::{Effect, PreviewOptions, TimerId, TimerIds, TimerKind};
use super::mobile::MobilePolicy;
use std::time::Duration;

/// Who decides whether the preview is hovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverSource {
    /// Parent view owns the flag; pointer events are ignored.
    External(bool),
    Manual(bool),
}

impl HoverSource {
    pub fn from_external(flag: Option<bool>) -> Self {
        match flag {
            Some(v) => HoverSource::External(v),
            None => HoverSource::Manual(false),
        }
    }

    pub fn is_hovering(self) -> bool {
        match self {
            HoverSource::External(v) | HoverSource::Manual(v) => v,
        }
    }

    pub fn is_external(self) -> bool {
        matches!(self, HoverSource::External(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    Paused,
    Playing,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: TimerId,
    kind: TimerKind,
}

/// Turns hover input and readiness into exactly one `Play` per hover period.
#[derive(Debug, Clone)]
pub struct HoverController {
    source: HoverSource,
    /// Hover after debouncing.
    settled: bool,
    pending: Option<Pending>,
    playback: Playback,
    ready: bool,
    mobile: bool,
    /// Cleared for mobile posters until the user taps.
    armed: bool,
    preview_mode: bool,
    enter_delay: Duration,
    leave_delay: Duration,
}

impl HoverController {
    pub fn new(opts: &PreviewOptions) -> Self {
        let source = HoverSource::from_external(opts.external_hover);
        let armed = !opts.is_mobile
            || MobilePolicy::choose(opts.poster_url.as_deref()) == MobilePolicy::MutedAutoplay;
        Self {
            source,
            settled: source.is_hovering(),
            pending: None,
            playback: Playback::Paused,
            ready: false,
            mobile: opts.is_mobile,
            armed,
            preview_mode: opts.preview_mode,
            enter_delay: opts.hover_enter_delay,
            leave_delay: opts.hover_leave_delay,
        }
    }

    pub fn source(&self) -> HoverSource {
        self.source
    }

    pub fn playback(&self) -> Playback {
        self.playback
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Hover as far as loading is concerned: raw input, not debounced.
    pub fn wants_media(&self) -> bool {
        self.mobile || self.source.is_hovering()
    }

    fn wants_play(&self) -> bool {
        self.ready && self.armed && (self.mobile || self.settled)
    }

    fn reconcile(&mut self, fx: &mut Vec<Effect>) {
        match (self.wants_play(), self.playback) {
            (true, Playback::Paused) => {
                self.playback = Playback::Playing;
                fx.push(Effect::Play);
            }
            (false, Playback::Playing) => {
                self.playback = Playback::Paused;
                fx.push(Effect::Pause {
                    rewind: self.preview_mode,
                });
            }
            _ => {}
        }
    }

    fn cancel_pending(&mut self, fx: &mut Vec<Effect>) {
        if let Some(p) = self.pending.take() {
            fx.push(Effect::CancelTimer(p.kind));
        }
    }

    fn ignores_pointer(&self) -> bool {
        self.mobile || self.source.is_external()
    }

    /// Returns false when the event was ignored.
    pub fn pointer_enter(&mut self, ids: &mut TimerIds, fx: &mut Vec<Effect>) -> bool {
        if self.ignores_pointer() {
            tracing::trace!("pointer enter ignored");
            return false;
        }
        self.source = HoverSource::Manual(true);
        match self.pending.map(|p| p.kind) {
            Some(TimerKind::HoverLeave) => {
                self.cancel_pending(fx);
                return true;
            }
            Some(_) => return true,
            None => {}
        }
        if self.settled {
            return true;
        }
        if self.enter_delay.is_zero() {
            self.settled = true;
            self.reconcile(fx);
        } else {
            self.arm(ids, TimerKind::HoverEnter, self.enter_delay, fx);
        }
        true
    }

    pub fn pointer_leave(&mut self, ids: &mut TimerIds, fx: &mut Vec<Effect>) -> bool {
        if self.ignores_pointer() {
            tracing::trace!("pointer leave ignored");
            return false;
        }
        self.source = HoverSource::Manual(false);
        match self.pending.map(|p| p.kind) {
            Some(TimerKind::HoverEnter) => {
                self.cancel_pending(fx);
                return true;
            }
            Some(_) => return true,
            None => {}
        }
        if !self.settled {
            return true;
        }
        if self.leave_delay.is_zero() {
            self.settled = false;
            self.reconcile(fx);
        } else {
            self.arm(ids, TimerKind::HoverLeave, self.leave_delay, fx);
        }
        true
    }

    fn arm(&mut self, ids: &mut TimerIds, kind: TimerKind, after: Duration, fx: &mut Vec<Effect>) {
        let id = ids.next();
        self.pending = Some(Pending { id, kind });
        fx.push(Effect::StartTimer { id, kind, after });
    }

    /// Returns true if the timer belonged to this controller.
    pub fn timer_fired(&mut self, id: TimerId, fx: &mut Vec<Effect>) -> bool {
        match self.pending {
            Some(p) if p.id == id => {
                self.pending = None;
                self.settled = p.kind == TimerKind::HoverEnter;
                self.reconcile(fx);
                true
            }
            _ => false,
        }
    }

    /// External changes skip debouncing. `None` hands control back to the pointer.
    pub fn set_external(&mut self, flag: Option<bool>, fx: &mut Vec<Effect>) {
        self.cancel_pending(fx);
        self.source = HoverSource::from_external(flag);
        self.settled = self.source.is_hovering();
        self.reconcile(fx);
    }

    pub fn set_ready(&mut self, ready: bool, fx: &mut Vec<Effect>) {
        self.ready = ready;
        self.reconcile(fx);
    }

    pub fn arm_autoplay(&mut self, fx: &mut Vec<Effect>) {
        self.armed = true;
        self.reconcile(fx);
    }

    /// The element was handed a new source; resume if we were playing.
    pub fn replay(&mut self, fx: &mut Vec<Effect>) {
        if self.playback == Playback::Playing {
            self.playback = Playback::Paused;
            self.reconcile(fx);
        }
    }

    pub fn play_failed(&mut self) {
        self.playback = Playback::Paused;
    }

    pub fn teardown(&mut self) {
        self.pending = None;
        self.ready = false;
        self.playback = Playback::Paused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> PreviewOptions {
        PreviewOptions {
            hover_enter_delay: Duration::from_millis(50),
            hover_leave_delay: Duration::ZERO,
            ..PreviewOptions::default()
        }
    }

    fn plays(fx: &[Effect]) -> usize {
        fx.iter().filter(|e| matches!(e, Effect::Play)).count()
    }

    fn started(fx: &[Effect]) -> TimerId {
        fx.iter()
            .find_map(|e| match e {
                Effect::StartTimer { id, .. } => Some(*id),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_debounced_enter_plays_once() {
        let mut h = HoverController::new(&opts());
        let mut ids = TimerIds::default();
        let mut fx = Vec::new();
        h.set_ready(true, &mut fx);
        assert!(fx.is_empty());

        h.pointer_enter(&mut ids, &mut fx);
        let id = started(&fx);
        assert_eq!(plays(&fx), 0);

        assert!(h.timer_fired(id, &mut fx));
        assert_eq!(plays(&fx), 1);

        h.pointer_enter(&mut ids, &mut fx);
        assert_eq!(plays(&fx), 1);
        assert_eq!(h.playback(), Playback::Playing);
    }

    #[test]
    fn test_leave_inside_window_cancels() {
        let mut h = HoverController::new(&opts());
        let mut ids = TimerIds::default();
        let mut fx = Vec::new();
        h.set_ready(true, &mut fx);
        h.pointer_enter(&mut ids, &mut fx);
        let id = started(&fx);
        h.pointer_leave(&mut ids, &mut fx);
        assert!(fx.contains(&Effect::CancelTimer(TimerKind::HoverEnter)));

        assert!(!h.timer_fired(id, &mut fx));
        assert_eq!(plays(&fx), 0);
    }

    #[test]
    fn test_leave_pauses_with_rewind_in_preview_mode() {
        let mut h = HoverController::new(&PreviewOptions {
            hover_enter_delay: Duration::ZERO,
            ..opts()
        });
        let mut ids = TimerIds::default();
        let mut fx = Vec::new();
        h.set_ready(true, &mut fx);
        h.pointer_enter(&mut ids, &mut fx);
        h.pointer_leave(&mut ids, &mut fx);
        assert_eq!(fx, vec![Effect::Play, Effect::Pause { rewind: true }]);

        let mut h = HoverController::new(&PreviewOptions {
            hover_enter_delay: Duration::ZERO,
            preview_mode: false,
            ..opts()
        });
        let mut fx = Vec::new();
        h.set_ready(true, &mut fx);
        h.pointer_enter(&mut ids, &mut fx);
        h.pointer_leave(&mut ids, &mut fx);
        assert_eq!(fx.last(), Some(&Effect::Pause { rewind: false }));
    }

    #[test]
    fn test_external_flag_overrides_pointer() {
        let mut h = HoverController::new(&opts().external_hover(Some(false)));
        let mut ids = TimerIds::default();
        let mut fx = Vec::new();
        h.set_ready(true, &mut fx);

        assert!(!h.pointer_enter(&mut ids, &mut fx));
        assert!(fx.is_empty());

        h.set_external(Some(true), &mut fx);
        h.set_external(Some(true), &mut fx);
        assert_eq!(fx, vec![Effect::Play]);

        h.set_external(None, &mut fx);
        assert_eq!(h.source(), HoverSource::Manual(false));
        assert_eq!(h.playback(), Playback::Paused);
    }

    #[test]
    fn test_hover_before_ready_plays_on_ready() {
        let mut h = HoverController::new(&opts().external_hover(Some(true)));
        let mut fx = Vec::new();
        assert!(h.wants_media());
        h.set_ready(true, &mut fx);
        assert_eq!(fx, vec![Effect::Play]);
    }

    #[test]
    fn test_mobile_poster_waits_for_tap() {
        let mut h = HoverController::new(
            &opts().mobile(true).with_poster(Some("https://cdn/p.jpg".into())),
        );
        let mut fx = Vec::new();
        h.set_ready(true, &mut fx);
        assert!(fx.is_empty());
        h.arm_autoplay(&mut fx);
        assert_eq!(fx, vec![Effect::Play]);
    }

    #[test]
    fn test_mobile_without_poster_autoplays() {
        let mut h = HoverController::new(&opts().mobile(true));
        let mut ids = TimerIds::default();
        let mut fx = Vec::new();
        h.set_ready(true, &mut fx);
        assert_eq!(fx, vec![Effect::Play]);
        assert!(!h.pointer_leave(&mut ids, &mut fx));
        assert_eq!(h.playback(), Playback::Playing);
    }
}
