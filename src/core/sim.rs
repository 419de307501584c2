//! Deterministic in-process media engine.
//!
//! `SimEngine` stands in for a platform engine in tests and in the demo
//! binary. Each attached instance shares its state with a [`SimController`],
//! through which the host flips engine properties (first frame ready, keep-up,
//! buffered ranges, failure, end of media). Every change is reported through
//! the installed [`SignalSink`], the way a real engine's observers fire.
//!
//! Transport behaves like an engine that does not wait to minimize stalls:
//! - `play()` sets rate 1 and reports playing once a frame is on screen
//! - `pause()` sets rate 0 and reports paused
//! - `seek()` completes immediately unless seeks are held

use log::trace;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::engine::{AssetHandle, EngineInstance, MediaEngine, SignalSink};
use super::types::{
    BufferingHints, EngineError, ItemId, ItemStatus, SeekTicket, TimeControlStatus, TimeRange,
};

/// Duration given to assets unless configured otherwise
pub const DEFAULT_SIM_DURATION: Duration = Duration::from_secs(10);

/// Commands received by a simulated instance.
#[derive(Clone, Debug, PartialEq)]
pub enum SimCommand {
    Play,
    Pause,
    Seek(Duration),
}

/// Decoded asset as built by the simulator.
#[derive(Debug)]
pub struct SimAsset {
    pub duration: Option<Duration>,
}

#[derive(Debug)]
struct SimState {
    item: ItemId,
    rate: f32,
    status: ItemStatus,
    error: Option<EngineError>,
    time_control: TimeControlStatus,
    ready_for_display: bool,
    keep_up: bool,
    current_time: Duration,
    duration: Option<Duration>,
    loaded: Vec<TimeRange>,
    volume: f32,
    muted: bool,
    hints: Option<BufferingHints>,
    hints_applied: usize,
    commands: Vec<SimCommand>,
    sink: Option<SignalSink>,
    hold_seeks: bool,
    pending_seek: Option<(SeekTicket, Duration)>,
}

impl SimState {
    fn new(duration: Option<Duration>) -> Self {
        Self {
            item: ItemId::new(),
            rate: 0.0,
            status: ItemStatus::Unknown,
            error: None,
            time_control: TimeControlStatus::Paused,
            ready_for_display: false,
            keep_up: false,
            current_time: Duration::ZERO,
            duration,
            loaded: Vec::new(),
            volume: 1.0,
            muted: false,
            hints: None,
            hints_applied: 0,
            commands: Vec::new(),
            sink: None,
            hold_seeks: false,
            pending_seek: None,
        }
    }

    fn emit(&self, f: impl FnOnce(&SignalSink)) {
        if let Some(sink) = &self.sink {
            f(sink);
        }
    }

    fn set_time_control(&mut self, status: TimeControlStatus) {
        if self.time_control != status {
            self.time_control = status;
            self.emit(|s| s.time_control_status_changed(status));
        }
    }

    fn clamp_time(&self, t: Duration) -> Duration {
        match self.duration {
            Some(d) => t.min(d),
            None => t,
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Simulated engine factory.
#[derive(Debug)]
pub struct SimEngine {
    duration: Option<Duration>,
    assets_opened: AtomicUsize,
    controllers: Mutex<Vec<SimController>>,
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEngine {
    pub fn new() -> Self {
        Self::with_duration(Some(DEFAULT_SIM_DURATION))
    }

    /// `None` simulates media whose duration is not known yet.
    pub fn with_duration(duration: Option<Duration>) -> Self {
        Self {
            duration,
            assets_opened: AtomicUsize::new(0),
            controllers: Mutex::new(Vec::new()),
        }
    }

    /// Number of assets built (cache misses seen by the engine).
    pub fn assets_opened(&self) -> usize {
        self.assets_opened.load(Ordering::Relaxed)
    }

    pub fn instances_attached(&self) -> usize {
        self.controllers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Controller of the most recently attached instance.
    pub fn last_controller(&self) -> Option<SimController> {
        self.controllers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl MediaEngine for SimEngine {
    fn open_asset(&self, url: &str) -> AssetHandle {
        self.assets_opened.fetch_add(1, Ordering::Relaxed);
        trace!("SimEngine: building asset for {}", url);
        AssetHandle::new(url, SimAsset { duration: self.duration })
    }

    fn attach(&self, url: &str, asset: AssetHandle) -> Box<dyn EngineInstance> {
        let duration = asset
            .downcast_ref::<SimAsset>()
            .map_or(self.duration, |a| a.duration);
        let state = Arc::new(Mutex::new(SimState::new(duration)));
        let item = lock(&state).item;
        self.controllers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SimController { state: Arc::clone(&state) });
        Box::new(SimInstance {
            url: url.to_string(),
            item,
            state,
        })
    }
}

/// Engine instance half of a simulated player.
#[derive(Debug)]
pub struct SimInstance {
    url: String,
    item: ItemId,
    state: Arc<Mutex<SimState>>,
}

impl EngineInstance for SimInstance {
    fn item_id(&self) -> ItemId {
        self.item
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn play(&mut self) {
        let mut s = lock(&self.state);
        s.commands.push(SimCommand::Play);
        if s.status == ItemStatus::Failed {
            return;
        }
        s.rate = 1.0;
        let next = if s.ready_for_display {
            TimeControlStatus::Playing
        } else {
            TimeControlStatus::WaitingToPlay
        };
        s.set_time_control(next);
    }

    fn pause(&mut self) {
        let mut s = lock(&self.state);
        s.commands.push(SimCommand::Pause);
        s.rate = 0.0;
        s.set_time_control(TimeControlStatus::Paused);
    }

    fn seek(&mut self, to: Duration, ticket: SeekTicket) {
        let mut s = lock(&self.state);
        s.commands.push(SimCommand::Seek(to));
        if s.hold_seeks {
            if let Some((interrupted, _)) = s.pending_seek.take() {
                s.emit(|sink| sink.seek_finished(interrupted, false));
            }
            s.pending_seek = Some((ticket, to));
            return;
        }
        let t = s.clamp_time(to);
        s.current_time = t;
        s.emit(|sink| sink.seek_finished(ticket, true));
    }

    fn rate(&self) -> f32 {
        lock(&self.state).rate
    }

    fn status(&self) -> ItemStatus {
        lock(&self.state).status
    }

    fn error(&self) -> Option<EngineError> {
        lock(&self.state).error.clone()
    }

    fn time_control_status(&self) -> TimeControlStatus {
        lock(&self.state).time_control
    }

    fn is_ready_for_display(&self) -> bool {
        lock(&self.state).ready_for_display
    }

    fn is_playback_likely_to_keep_up(&self) -> bool {
        lock(&self.state).keep_up
    }

    fn current_time(&self) -> Duration {
        lock(&self.state).current_time
    }

    fn duration(&self) -> Option<Duration> {
        lock(&self.state).duration
    }

    fn loaded_time_ranges(&self) -> Vec<TimeRange> {
        lock(&self.state).loaded.clone()
    }

    fn apply_buffering_hints(&mut self, hints: &BufferingHints) {
        let mut s = lock(&self.state);
        s.hints = Some(hints.clone());
        s.hints_applied += 1;
    }

    fn volume(&self) -> f32 {
        lock(&self.state).volume
    }

    fn set_volume(&mut self, volume: f32) {
        lock(&self.state).volume = volume;
    }

    fn is_muted(&self) -> bool {
        lock(&self.state).muted
    }

    fn set_muted(&mut self, muted: bool) {
        lock(&self.state).muted = muted;
    }

    fn observe(&mut self, sink: Option<SignalSink>) {
        lock(&self.state).sink = sink;
    }
}

/// Host-side handle to a simulated instance.
#[derive(Clone, Debug)]
pub struct SimController {
    state: Arc<Mutex<SimState>>,
}

impl SimController {
    pub fn item_id(&self) -> ItemId {
        lock(&self.state).item
    }

    /// Commands received so far, oldest first.
    pub fn commands(&self) -> Vec<SimCommand> {
        lock(&self.state).commands.clone()
    }

    pub fn clear_commands(&self) {
        lock(&self.state).commands.clear();
    }

    pub fn hints(&self) -> Option<BufferingHints> {
        lock(&self.state).hints.clone()
    }

    pub fn hints_applied(&self) -> usize {
        lock(&self.state).hints_applied
    }

    pub fn is_observed(&self) -> bool {
        lock(&self.state).sink.is_some()
    }

    /// Sink currently installed by the observer, if any.
    pub fn sink(&self) -> Option<SignalSink> {
        lock(&self.state).sink.clone()
    }

    pub fn rate(&self) -> f32 {
        lock(&self.state).rate
    }

    pub fn current_time(&self) -> Duration {
        lock(&self.state).current_time
    }

    /// Change the rate without any signal.
    pub fn set_rate(&self, rate: f32) {
        lock(&self.state).rate = rate;
    }

    pub fn set_current_time(&self, t: Duration) {
        let mut s = lock(&self.state);
        let t = s.clamp_time(t);
        s.current_time = t;
    }

    pub fn set_duration(&self, duration: Option<Duration>) {
        lock(&self.state).duration = duration;
    }

    /// Move the playhead forward by `dt`, as playback would.
    pub fn advance(&self, dt: Duration) {
        let mut s = lock(&self.state);
        let t = s.clamp_time(s.current_time + dt);
        s.current_time = t;
    }

    /// First frame renderable (or not). Reports playing if already started.
    pub fn set_ready_for_display(&self, ready: bool) {
        let mut s = lock(&self.state);
        s.ready_for_display = ready;
        s.status = ItemStatus::ReadyToPlay;
        s.emit(|sink| sink.ready_for_display_changed(ready));
        if ready && s.rate > 0.0 {
            s.set_time_control(TimeControlStatus::Playing);
        }
    }

    pub fn set_keep_up(&self, likely: bool) {
        let mut s = lock(&self.state);
        s.keep_up = likely;
        s.emit(|sink| sink.keep_up_changed(likely));
    }

    /// Buffer underrun: playback stops until the engine can keep up.
    pub fn stall(&self) {
        let mut s = lock(&self.state);
        s.keep_up = false;
        s.rate = 0.0;
        s.emit(|sink| sink.keep_up_changed(false));
        s.set_time_control(TimeControlStatus::Paused);
    }

    /// One loaded range from zero to `end`.
    pub fn set_loaded_until(&self, end: Duration) {
        let mut s = lock(&self.state);
        s.loaded = vec![TimeRange::new(Duration::ZERO, end)];
        s.emit(|sink| sink.loaded_time_ranges_changed());
    }

    pub fn fail(&self, error: EngineError) {
        let mut s = lock(&self.state);
        s.status = ItemStatus::Failed;
        s.error = Some(error);
        s.rate = 0.0;
        s.emit(|sink| sink.status_changed(ItemStatus::Failed));
    }

    /// Playhead reaches the end: end notification, then the engine stops.
    pub fn reach_end(&self) {
        let mut s = lock(&self.state);
        if let Some(d) = s.duration {
            s.current_time = d;
        }
        let item = s.item;
        s.emit(|sink| sink.did_play_to_end(item));
        s.rate = 0.0;
        s.set_time_control(TimeControlStatus::Paused);
    }

    /// Defer seek completions until [`SimController::release_seeks`].
    pub fn hold_seeks(&self, hold: bool) {
        lock(&self.state).hold_seeks = hold;
    }

    /// Complete the outstanding held seek, if any.
    pub fn release_seeks(&self) {
        let mut s = lock(&self.state);
        if let Some((ticket, to)) = s.pending_seek.take() {
            let t = s.clamp_time(to);
            s.current_time = t;
            s.emit(|sink| sink.seek_finished(ticket, true));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use crate::core::engine::EngineSignal;

    fn instance() -> (Box<dyn EngineInstance>, SimController, crossbeam_channel::Receiver<EngineSignal>) {
        let engine = SimEngine::new();
        let mut inst = engine.attach("sim://x", engine.open_asset("sim://x"));
        let (tx, rx) = unbounded();
        inst.observe(Some(SignalSink::new(tx)));
        let ctl = engine.last_controller().expect("controller");
        (inst, ctl, rx)
    }

    #[test]
    fn test_play_waits_for_first_frame() {
        let (mut inst, ctl, rx) = instance();
        inst.play();
        ctl.set_ready_for_display(true);

        let signals: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            signals,
            vec![
                EngineSignal::TimeControlStatusChanged(TimeControlStatus::WaitingToPlay),
                EngineSignal::ReadyForDisplayChanged(true),
                EngineSignal::TimeControlStatusChanged(TimeControlStatus::Playing),
            ]
        );
        assert_eq!(inst.rate(), 1.0);
    }

    #[test]
    fn test_held_seek_interrupted() {
        let (mut inst, ctl, rx) = instance();
        ctl.hold_seeks(true);
        inst.seek(Duration::from_secs(2), SeekTicket(1));
        inst.seek(Duration::from_secs(4), SeekTicket(2));
        ctl.release_seeks();

        let signals: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            signals,
            vec![
                EngineSignal::SeekFinished { ticket: SeekTicket(1), success: false },
                EngineSignal::SeekFinished { ticket: SeekTicket(2), success: true },
            ]
        );
        assert_eq!(ctl.current_time(), Duration::from_secs(4));
    }

    #[test]
    fn test_seek_clamped_to_duration() {
        let (mut inst, ctl, _rx) = instance();
        inst.seek(Duration::from_secs(60), SeekTicket(1));
        assert_eq!(ctl.current_time(), DEFAULT_SIM_DURATION);
    }
}
