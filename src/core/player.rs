//! Video player component: one engine instance, one session, one view.
//!
//! **Architecture**: `VideoPlayer` owns the current engine instance, the
//! [`PlaybackStateMachine`] and the [`EngineObserverBridge`]. Requests and
//! engine signals are turned into machine inputs; the returned effects are
//! carried out here (engine commands, event bus notifications).
//!
//! **Used by**: host views, [`ScrubBinding`](crate::widgets::scrub::ScrubBinding)
//!
//! # Threading
//!
//! Single UI context. Engines may report from any thread; nothing happens
//! until the host calls [`VideoPlayer::pump`] on the UI context, which drains
//! the signals and runs the resulting transitions and seek completions.
//! Seek completions must not re-enter the player.
//!
//! # Lifecycle
//!
//! `load(url)` builds a new engine instance (asset from the cache, built on
//! miss) and resets the session, unless `url` is already attached to a live
//! instance, which is then reused with buffering hints re-applied. The old
//! instance is detached and dropped; its outstanding seeks complete with
//! `false`.

use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::asset_cache::AssetCache;
use super::bridge::{EngineObserverBridge, progress_of};
use super::engine::{EngineInstance, EngineSignal, MediaEngine};
use super::event_bus::EventBus;
use super::player_events::{DidPlayToEndEvent, ReplayEvent, StateChangedEvent, VisibilityChangedEvent};
use super::state::{Effect, Input, PauseReason, PlaybackState, PlaybackStateMachine};
use super::types::{BufferingHints, ItemStatus, Progress, SeekTicket};
use crate::config::PlayerConfig;

/// Drain rounds per `pump()`; signals caused by a round are handled in the next.
const MAX_PUMP_ROUNDS: usize = 32;

/// Called once with `true` when a seek finished, `false` if it was interrupted.
pub type SeekCompletion = Box<dyn FnOnce(bool)>;

pub struct VideoPlayer {
    engine: Arc<dyn MediaEngine>,
    cache: Arc<AssetCache>,
    buffering: BufferingHints,
    machine: PlaybackStateMachine,
    bridge: EngineObserverBridge,
    instance: Option<Box<dyn EngineInstance>>,
    events: EventBus,
    pending_seeks: HashMap<SeekTicket, SeekCompletion>,
    next_ticket: u64,
}

impl VideoPlayer {
    /// Player backed by the process-wide asset cache.
    pub fn new(engine: Arc<dyn MediaEngine>, config: &PlayerConfig) -> Self {
        Self::with_cache(engine, AssetCache::shared(), config)
    }

    /// Player backed by `cache` (isolated caches for tests or embedding).
    pub fn with_cache(engine: Arc<dyn MediaEngine>, cache: Arc<AssetCache>, config: &PlayerConfig) -> Self {
        debug!("VideoPlayer created: auto_replay={}", config.auto_replay);
        Self {
            engine,
            cache,
            buffering: config.buffering.clone(),
            machine: PlaybackStateMachine::new(config.auto_replay),
            bridge: EngineObserverBridge::new(),
            instance: None,
            events: EventBus::new(),
            pending_seeks: HashMap::new(),
            next_ticket: 0,
        }
    }

    /// Notifications: [`StateChangedEvent`], [`VisibilityChangedEvent`],
    /// [`DidPlayToEndEvent`], [`ReplayEvent`].
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    // ========== Loading ==========

    pub fn load(&mut self, url: &str) {
        if let Some(instance) = self.instance.as_mut()
            && instance.url() == url
            && instance.status() != ItemStatus::Failed
        {
            info!("Player with {} already attached, reusing", url);
            instance.apply_buffering_hints(&self.buffering);
            // Deliver what the current attachment already reported
            self.pump();
            if let Some(instance) = self.instance.as_mut() {
                self.bridge.attach(instance.as_mut());
            }
            return;
        }

        self.release_instance();

        let engine = Arc::clone(&self.engine);
        let (asset, inserted) = self.cache.get_or_insert_with(url, || engine.open_asset(url));
        if inserted {
            info!("Loading {} (new asset)", url);
        } else {
            info!("Loading {} (cached asset)", url);
        }

        let mut instance = self.engine.attach(url, asset);
        instance.apply_buffering_hints(&self.buffering);

        let fx = self.machine.apply(Input::Attached);
        self.bridge.attach(instance.as_mut());
        self.instance = Some(instance);
        self.apply_effects(fx);
    }

    /// Detach observers and drop the current instance.
    fn release_instance(&mut self) {
        if let Some(mut old) = self.instance.take() {
            debug!("Releasing engine instance for {}", old.url());
            self.bridge.detach(Some(old.as_mut()));
        } else {
            self.bridge.detach(None);
        }
        self.flush_seeks();
    }

    /// Cancel all engine subscriptions. Safe to call repeatedly; `load()`
    /// re-establishes them.
    pub fn stop_observing(&mut self) {
        match self.instance.as_mut() {
            Some(instance) => self.bridge.detach(Some(instance.as_mut())),
            None => self.bridge.detach(None),
        }
        self.flush_seeks();
    }

    // ========== Transport ==========

    pub fn play(&mut self) {
        let fx = self.machine.apply(Input::Play);
        self.apply_effects(fx);
    }

    pub fn pause(&mut self, reason: PauseReason) {
        let fx = self.machine.apply(Input::Pause(reason));
        self.apply_effects(fx);
    }

    /// Restart from the beginning, counting a replay unless `reset_count`.
    pub fn replay(&mut self, reset_count: bool) {
        let fx = self.machine.apply(Input::Replay { reset_count });
        self.apply_effects(fx);
    }

    /// Move the playhead; `completion` runs exactly once from `pump()`, or
    /// right away with `false` when nothing is attached.
    pub fn seek(&mut self, to: Duration, completion: impl FnOnce(bool) + 'static) {
        let Some(instance) = self.instance.as_mut() else {
            debug!("Seek without engine instance");
            completion(false);
            return;
        };
        let ticket = SeekTicket(self.next_ticket);
        self.next_ticket += 1;
        self.pending_seeks.insert(ticket, Box::new(completion));
        trace!("Seek to {:?} ({:?})", to, ticket);
        instance.seek(to, ticket);
    }

    /// Seek to `fraction` (0..1) of the total duration. Out-of-range values
    /// are clamped; NaN seeks to the start.
    pub fn seek_to_fraction(&mut self, fraction: f64, completion: impl FnOnce(bool) + 'static) {
        let total = self.instance.as_ref().and_then(|i| i.duration());
        match total {
            Some(total) if !total.is_zero() => {
                let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
                let to = total.mul_f64(fraction);
                self.seek(to, completion);
            }
            _ => {
                debug!("Seek to fraction {} without known duration", fraction);
                completion(false);
            }
        }
    }

    // ========== Signal processing ==========

    /// Process engine signals on the UI context. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        for _ in 0..MAX_PUMP_ROUNDS {
            let signals = self.bridge.drain();
            if signals.is_empty() {
                return handled;
            }
            handled += signals.len();
            for signal in signals {
                self.dispatch(signal);
            }
        }
        warn!("Engine still signalling after {} rounds, deferring", MAX_PUMP_ROUNDS);
        handled
    }

    fn dispatch(&mut self, signal: EngineSignal) {
        if let EngineSignal::SeekFinished { ticket, success } = signal {
            self.finish_seek(ticket, success);
            return;
        }
        let Some(instance) = self.instance.as_deref() else {
            return;
        };
        let Some(input) = self.bridge.translate(&signal, instance) else {
            trace!("Signal without effect: {:?}", signal);
            return;
        };
        let fx = self.machine.apply(input);
        self.apply_effects(fx);
    }

    fn finish_seek(&mut self, ticket: SeekTicket, success: bool) {
        match self.pending_seeks.remove(&ticket) {
            Some(completion) => {
                if !success {
                    trace!("Seek {:?} interrupted", ticket);
                }
                completion(success);
            }
            None => trace!("Seek {:?} finished (no completion)", ticket),
        }
    }

    /// Complete every outstanding seek with `false`.
    fn flush_seeks(&mut self) {
        if self.pending_seeks.is_empty() {
            return;
        }
        debug!("Superseding {} pending seek(s)", self.pending_seeks.len());
        let mut pending: Vec<_> = self.pending_seeks.drain().collect();
        pending.sort_by_key(|(ticket, _)| ticket.0);
        for (_, completion) in pending {
            completion(false);
        }
    }

    fn apply_effects(&mut self, fx: Vec<Effect>) {
        for effect in fx {
            match effect {
                Effect::Play => {
                    if let Some(instance) = self.instance.as_mut() {
                        instance.play();
                    }
                }
                Effect::Pause => {
                    if let Some(instance) = self.instance.as_mut() {
                        instance.pause();
                    }
                }
                Effect::SeekToStart => {
                    if let Some(instance) = self.instance.as_mut() {
                        let ticket = SeekTicket(self.next_ticket);
                        self.next_ticket += 1;
                        instance.seek(Duration::ZERO, ticket);
                    }
                }
                Effect::StateChanged(state) => self.events.emit(StateChangedEvent { state }),
                Effect::VisibilityChanged(visible) => self.events.emit(VisibilityChangedEvent(visible)),
                Effect::DidPlayToEnd => self.events.emit(DidPlayToEndEvent),
                Effect::Replay { replay_count } => self.events.emit(ReplayEvent { replay_count }),
            }
        }
    }

    // ========== Session ==========

    pub fn state(&self) -> &PlaybackState {
        self.machine.state()
    }

    pub fn pause_reason(&self) -> PauseReason {
        self.machine.pause_reason()
    }

    pub fn replay_count(&self) -> u32 {
        self.machine.replay_count()
    }

    /// True once the first frame has been renderable.
    pub fn is_loaded(&self) -> bool {
        self.machine.is_loaded()
    }

    /// View visibility: shown only while playing or paused.
    pub fn is_hidden(&self) -> bool {
        !self.machine.is_visible()
    }

    pub fn auto_replay(&self) -> bool {
        self.machine.auto_replay()
    }

    pub fn set_auto_replay(&mut self, enabled: bool) {
        self.machine.set_auto_replay(enabled);
    }

    /// Locator of the attached instance.
    pub fn current_url(&self) -> Option<&str> {
        self.instance.as_ref().map(|i| i.url())
    }

    // ========== Progress ==========

    fn loaded_instance(&self) -> Option<&dyn EngineInstance> {
        self.instance.as_deref().filter(|_| self.machine.is_loaded())
    }

    fn progress(&self) -> Progress {
        self.loaded_instance().map(progress_of).unwrap_or_default()
    }

    /// Played fraction, 0..1.
    pub fn play_progress(&self) -> f64 {
        self.progress().play
    }

    /// Buffered fraction, 0..1.
    pub fn buffer_progress(&self) -> f64 {
        self.progress().buffer
    }

    /// Played length in seconds.
    pub fn current_duration(&self) -> f64 {
        self.loaded_instance()
            .map(|i| i.current_time().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Buffered length in seconds.
    pub fn current_buffer_duration(&self) -> f64 {
        self.loaded_instance()
            .and_then(|i| i.loaded_time_ranges().first().map(|r| r.end().as_secs_f64()))
            .unwrap_or(0.0)
    }

    /// Total media duration in seconds.
    pub fn total_duration(&self) -> f64 {
        self.loaded_instance()
            .and_then(|i| i.duration())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Total watch time in seconds, including completed loops.
    pub fn watch_duration(&self) -> f64 {
        if !self.is_loaded() {
            return 0.0;
        }
        self.current_duration() + self.total_duration() * f64::from(self.replay_count())
    }

    // ========== Audio ==========

    pub fn volume(&self) -> f32 {
        self.instance.as_ref().map(|i| i.volume()).unwrap_or(0.0)
    }

    /// Volume of this instance only, 0..1.
    pub fn set_volume(&mut self, volume: f32) {
        if let Some(instance) = self.instance.as_mut() {
            instance.set_volume(volume.clamp(0.0, 1.0));
        }
    }

    pub fn is_muted(&self) -> bool {
        self.instance.as_ref().map(|i| i.is_muted()).unwrap_or(false)
    }

    pub fn set_muted(&mut self, muted: bool) {
        if let Some(instance) = self.instance.as_mut() {
            instance.set_muted(muted);
        }
    }
}

impl Drop for VideoPlayer {
    fn drop(&mut self) {
        self.stop_observing();
    }
}
