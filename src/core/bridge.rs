//! Engine observer bridge: engine property signals -> state machine inputs.
//!
//! **Subscriptions**: one channel per attachment. `attach()` drops the previous
//! channel before installing a new [`SignalSink`] on the instance, and
//! `detach()` cancels the instance's subscriptions. Engines hold only the
//! sending side, never the player, so a sink that outlives its attachment
//! (or its player) just has its signals dropped.
//!
//! **Marshalling**: engine threads push into the channel; `drain()` is called
//! on the UI context, so state is only ever touched there.
//!
//! **Translation**: `translate()` checks the engine-side half of each rule
//! (rate, ready-for-display, item identity) and reads the progress snapshot.
//! The session-side half (pause reason, replay window) belongs to the state
//! machine.
//!
//! | Signal                  | Engine condition            | Input               |
//! |-------------------------|-----------------------------|---------------------|
//! | loaded ranges changed   | -                           | `BufferProgressed`  |
//! | status changed          | status == failed            | `Failed`            |
//! | keep-up changed         | likely && rate == 0         | `KeepUpRecovered`   |
//! | ready-for-display       | ready && rate > 0           | `ReadyForDisplay`   |
//! | time-control paused     | -                           | `EnginePaused`      |
//! | time-control playing    | ready && rate > 0           | `EnginePlaying`     |
//! | did play to end         | item is the current item    | `ReachedEnd`        |

use crossbeam_channel::{Receiver, unbounded};
use log::{debug, trace};

use super::engine::{EngineInstance, EngineSignal, SignalSink};
use super::state::Input;
use super::types::{EngineError, ItemId, ItemStatus, Progress, TimeControlStatus};

#[derive(Debug, Default)]
pub struct EngineObserverBridge {
    rx: Option<Receiver<EngineSignal>>,
    item: Option<ItemId>,
}

impl EngineObserverBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every signal of `instance`, tearing down any previous
    /// attachment first.
    pub fn attach(&mut self, instance: &mut dyn EngineInstance) {
        self.teardown();

        let (tx, rx) = unbounded();
        instance.observe(Some(SignalSink::new(tx)));
        self.rx = Some(rx);
        self.item = Some(instance.item_id());
        debug!("Observing item {} ({})", instance.item_id(), instance.url());
    }

    /// Cancel all subscriptions. Safe to call repeatedly.
    pub fn detach(&mut self, instance: Option<&mut dyn EngineInstance>) {
        if let Some(instance) = instance {
            instance.observe(None);
        }
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(item) = self.item.take() {
            debug!("Stopped observing item {}", item);
        }
        // Dropping the receiver disconnects every outstanding sink
        self.rx = None;
    }

    pub fn is_attached(&self) -> bool {
        self.rx.is_some()
    }

    pub fn current_item(&self) -> Option<ItemId> {
        self.item
    }

    /// Signals delivered since the last call, in arrival order.
    pub fn drain(&self) -> Vec<EngineSignal> {
        match &self.rx {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Map a raw signal to a state machine input, or `None` if the engine-side
    /// condition does not hold. Seek completions are not inputs.
    pub fn translate(&self, signal: &EngineSignal, engine: &dyn EngineInstance) -> Option<Input> {
        match signal {
            EngineSignal::LoadedTimeRangesChanged => Some(Input::BufferProgressed(progress_of(engine))),
            EngineSignal::StatusChanged(ItemStatus::Failed) => {
                Some(Input::Failed(engine.error().unwrap_or_else(EngineError::unknown)))
            }
            EngineSignal::StatusChanged(status) => {
                trace!("Item status: {:?}", status);
                None
            }
            EngineSignal::KeepUpChanged(likely) => {
                (*likely && engine.rate() == 0.0).then_some(Input::KeepUpRecovered)
            }
            EngineSignal::ReadyForDisplayChanged(ready) => {
                (*ready && engine.rate() > 0.0).then(|| Input::ReadyForDisplay(progress_of(engine)))
            }
            EngineSignal::TimeControlStatusChanged(TimeControlStatus::Paused) => {
                Some(Input::EnginePaused(progress_of(engine)))
            }
            EngineSignal::TimeControlStatusChanged(TimeControlStatus::WaitingToPlay) => None,
            EngineSignal::TimeControlStatusChanged(TimeControlStatus::Playing) => {
                (engine.is_ready_for_display() && engine.rate() > 0.0)
                    .then(|| Input::EnginePlaying(progress_of(engine)))
            }
            EngineSignal::DidPlayToEnd(item) => {
                if self.item == Some(*item) {
                    Some(Input::ReachedEnd)
                } else {
                    debug!("End of foreign item {} ignored", item);
                    None
                }
            }
            EngineSignal::SeekFinished { .. } => None,
        }
    }
}

/// Play/buffer fractions read from the engine. Buffer end is the end of the
/// first loaded range.
pub fn progress_of(engine: &dyn EngineInstance) -> Progress {
    let buffered = engine
        .loaded_time_ranges()
        .first()
        .map(|r| r.end())
        .unwrap_or_default();
    Progress::from_times(engine.current_time(), buffered, engine.duration())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sim::SimEngine;
    use crate::core::engine::MediaEngine;
    use std::time::Duration;

    fn attached() -> (EngineObserverBridge, Box<dyn EngineInstance>, crate::core::sim::SimController) {
        let engine = SimEngine::new();
        let asset = engine.open_asset("sim://clip");
        let mut instance = engine.attach("sim://clip", asset);
        let mut bridge = EngineObserverBridge::new();
        bridge.attach(instance.as_mut());
        let ctl = engine.last_controller().expect("attached instance");
        (bridge, instance, ctl)
    }

    #[test]
    fn test_attach_detach_idempotent() {
        let (mut bridge, mut instance, ctl) = attached();
        assert!(bridge.is_attached());
        assert!(ctl.is_observed());

        bridge.detach(Some(instance.as_mut()));
        bridge.detach(Some(instance.as_mut()));
        bridge.detach(None);
        assert!(!bridge.is_attached());
        assert!(!ctl.is_observed());
        assert!(bridge.drain().is_empty());
    }

    #[test]
    fn test_signals_marshalled_in_order() {
        let (bridge, _instance, ctl) = attached();
        ctl.set_keep_up(true);
        ctl.set_loaded_until(Duration::from_secs(2));

        assert_eq!(
            bridge.drain(),
            vec![EngineSignal::KeepUpChanged(true), EngineSignal::LoadedTimeRangesChanged]
        );
        assert!(bridge.drain().is_empty());
    }

    #[test]
    fn test_old_sink_dropped_after_reattach() {
        let engine = SimEngine::new();
        let mut first = engine.attach("sim://a", engine.open_asset("sim://a"));
        let old = engine.last_controller().expect("first");
        let mut second = engine.attach("sim://b", engine.open_asset("sim://b"));

        let mut bridge = EngineObserverBridge::new();
        bridge.attach(first.as_mut());
        // Keep the old sink alive in the engine while switching
        let stale = old.sink().expect("sink installed");
        bridge.attach(second.as_mut());

        stale.keep_up_changed(true);
        assert!(bridge.drain().is_empty());
        assert_eq!(bridge.current_item(), Some(second.item_id()));
    }

    #[test]
    fn test_translate_engine_conditions() {
        let (bridge, instance, ctl) = attached();
        let engine = instance.as_ref();

        // Keep-up only matters while stopped
        assert_eq!(
            bridge.translate(&EngineSignal::KeepUpChanged(true), engine),
            Some(Input::KeepUpRecovered)
        );
        assert_eq!(bridge.translate(&EngineSignal::KeepUpChanged(false), engine), None);

        // Ready-for-display needs a positive rate
        assert_eq!(bridge.translate(&EngineSignal::ReadyForDisplayChanged(true), engine), None);
        ctl.set_rate(1.0);
        assert!(matches!(
            bridge.translate(&EngineSignal::ReadyForDisplayChanged(true), engine),
            Some(Input::ReadyForDisplay(_))
        ));
        assert_eq!(bridge.translate(&EngineSignal::KeepUpChanged(true), engine), None);

        // Playing needs the frame on screen too
        let playing = EngineSignal::TimeControlStatusChanged(TimeControlStatus::Playing);
        assert_eq!(bridge.translate(&playing, engine), None);
        ctl.set_ready_for_display(true);
        assert!(matches!(bridge.translate(&playing, engine), Some(Input::EnginePlaying(_))));

        let waiting = EngineSignal::TimeControlStatusChanged(TimeControlStatus::WaitingToPlay);
        assert_eq!(bridge.translate(&waiting, engine), None);
    }

    #[test]
    fn test_translate_failure_and_end() {
        let (bridge, instance, ctl) = attached();
        let cause = EngineError::new("sim", 404, "not found");
        ctl.fail(cause.clone());

        assert_eq!(
            bridge.translate(&EngineSignal::StatusChanged(ItemStatus::Failed), instance.as_ref()),
            Some(Input::Failed(cause))
        );
        assert_eq!(
            bridge.translate(&EngineSignal::StatusChanged(ItemStatus::ReadyToPlay), instance.as_ref()),
            None
        );

        assert_eq!(
            bridge.translate(&EngineSignal::DidPlayToEnd(instance.item_id()), instance.as_ref()),
            Some(Input::ReachedEnd)
        );
        assert_eq!(
            bridge.translate(&EngineSignal::DidPlayToEnd(ItemId::new()), instance.as_ref()),
            None
        );
    }

    #[test]
    fn test_progress_uses_first_range() {
        let (_bridge, instance, ctl) = attached();
        ctl.set_duration(Some(Duration::from_secs(10)));
        ctl.set_current_time(Duration::from_secs(3));
        ctl.set_loaded_until(Duration::from_secs(5));

        let p = progress_of(instance.as_ref());
        assert_eq!(p.play, 0.3);
        assert_eq!(p.buffer, 0.5);
    }
}
