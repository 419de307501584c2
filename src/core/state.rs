//! Playback state machine.
//!
//! Owns the lifecycle state, pause reason, replay counter and loop policy.
//! Every user request and every translated engine signal enters through
//! [`PlaybackStateMachine::apply`], which mutates session state and returns
//! the [`Effect`]s the owner must carry out (engine commands, notifications,
//! visibility). No engine is touched here, so transitions are testable alone.
//!
//! # States
//!
//! ```text
//! none -> loading -> playing <-> paused
//!   any state -> error (terminal until the next fresh load)
//! ```
//!
//! Transitions to an equal state are suppressed (see [`PlaybackState`]'s
//! equality), and so is their notification.

use log::{debug, error, trace};

use super::types::{EngineError, Progress};

/// Lifecycle state surfaced to the caller.
///
/// Equality: `Paused` compares both fractions, `Error` compares causes,
/// all other variants compare by tag.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PlaybackState {
    /// No media attached, or session reset.
    #[default]
    None,
    /// Engine attached, first frame not renderable yet.
    Loading,
    Playing,
    /// Stopped, with the last known progress snapshot.
    Paused { play_progress: f64, buffer_progress: f64 },
    /// Unrecoverable playback failure.
    Error(EngineError),
}

impl PlaybackState {
    fn paused(progress: Progress) -> Self {
        Self::Paused {
            play_progress: progress.play,
            buffer_progress: progress.buffer,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Playing and paused show the view; everything else hides it.
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused { .. })
    }
}

/// Why playback is currently paused (or would be).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PauseReason {
    /// View not visible: buffer progress is not re-published.
    Hidden,
    /// Explicit pause request.
    UserInteraction,
    /// Playback requested; stalls are resumed automatically.
    WaitingKeepUp,
}

/// Inputs to the state machine.
///
/// Engine-side conditions (rate, readiness, item identity) have already been
/// checked by the observer bridge; the machine checks session-side ones.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    /// Fresh engine attached: reset the session and start loading.
    Attached,
    Play,
    Pause(PauseReason),
    Replay { reset_count: bool },
    /// Buffered ranges changed.
    BufferProgressed(Progress),
    /// Item status became failed.
    Failed(EngineError),
    /// Engine can keep up again while its rate is 0.
    KeepUpRecovered,
    /// First frame renderable while the rate is positive.
    ReadyForDisplay(Progress),
    /// Time-control status became paused.
    EnginePaused(Progress),
    /// Time-control status became playing, frame ready and rate positive.
    EnginePlaying(Progress),
    /// Current item reached its end.
    ReachedEnd,
}

/// Side effects requested by a transition, in the order they must run.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Play,
    Pause,
    SeekToStart,
    StateChanged(PlaybackState),
    VisibilityChanged(bool),
    DidPlayToEnd,
    Replay { replay_count: u32 },
}

/// Session state of one playback component.
#[derive(Clone, Debug)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
    pause_reason: PauseReason,
    replay_count: u32,
    /// True once the first frame is renderable
    is_loaded: bool,
    /// True inside an automatic loop-restart window
    is_replay: bool,
    /// Stopped at the end of the item without looping; not a stall
    at_end: bool,
    auto_replay: bool,
    visible: bool,
    /// Last progress seen, also updated while hidden (without notifying)
    last_progress: Progress,
}

impl Default for PlaybackStateMachine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PlaybackStateMachine {
    pub fn new(auto_replay: bool) -> Self {
        Self {
            state: PlaybackState::None,
            pause_reason: PauseReason::WaitingKeepUp,
            replay_count: 0,
            is_loaded: false,
            is_replay: false,
            at_end: false,
            auto_replay,
            visible: false,
            last_progress: Progress::ZERO,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn pause_reason(&self) -> PauseReason {
        self.pause_reason
    }

    pub fn replay_count(&self) -> u32 {
        self.replay_count
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn is_replay(&self) -> bool {
        self.is_replay
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// True after the item ended without an automatic restart, until the
    /// next play, replay or load.
    pub fn is_at_end(&self) -> bool {
        self.at_end
    }

    pub fn auto_replay(&self) -> bool {
        self.auto_replay
    }

    pub fn set_auto_replay(&mut self, enabled: bool) {
        self.auto_replay = enabled;
    }

    /// Progress as the caller should see it: zero until loaded.
    pub fn last_progress(&self) -> Progress {
        self.gate(self.last_progress)
    }

    fn gate(&self, progress: Progress) -> Progress {
        if self.is_loaded { progress } else { Progress::ZERO }
    }

    /// Single transition function for user requests and engine signals.
    pub fn apply(&mut self, input: Input) -> Vec<Effect> {
        let mut fx = Vec::new();

        if self.state.is_error() && !matches!(input, Input::Attached | Input::Pause(_)) {
            trace!("Ignoring {:?} in error state", input);
            return fx;
        }

        match input {
            Input::Attached => {
                self.replay_count = 0;
                self.is_loaded = false;
                self.is_replay = false;
                self.at_end = false;
                self.pause_reason = PauseReason::Hidden;
                self.last_progress = Progress::ZERO;
                self.transition(PlaybackState::None, &mut fx);
                self.transition(PlaybackState::Loading, &mut fx);
            }
            Input::Play => {
                self.pause_reason = PauseReason::WaitingKeepUp;
                self.at_end = false;
                fx.push(Effect::Play);
            }
            Input::Pause(reason) => {
                self.pause_reason = reason;
                fx.push(Effect::Pause);
                if reason == PauseReason::Hidden {
                    // Hidden views restart from the beginning
                    fx.push(Effect::SeekToStart);
                }
            }
            Input::Replay { reset_count } => {
                self.replay_count = if reset_count { 0 } else { self.replay_count + 1 };
                self.at_end = false;
                fx.push(Effect::SeekToStart);
                fx.push(Effect::Play);
            }
            Input::BufferProgressed(progress) => {
                self.last_progress = progress;
                if self.state.is_paused() && self.pause_reason != PauseReason::Hidden {
                    let next = PlaybackState::paused(self.gate(progress));
                    self.transition(next, &mut fx);
                }
            }
            Input::Failed(cause) => {
                error!("Playback failed: {}", cause);
                self.transition(PlaybackState::Error(cause), &mut fx);
            }
            Input::KeepUpRecovered => {
                if self.pause_reason == PauseReason::WaitingKeepUp {
                    debug!("Keep-up recovered, resuming");
                    fx.push(Effect::Play);
                }
            }
            Input::ReadyForDisplay(progress) => {
                self.last_progress = progress;
                self.is_loaded = true;
                self.transition(PlaybackState::Playing, &mut fx);
            }
            Input::EnginePaused(progress) => {
                self.last_progress = progress;
                if self.is_replay {
                    trace!("Paused signal inside replay window suppressed");
                    return fx;
                }
                let next = PlaybackState::paused(self.gate(progress));
                self.transition(next, &mut fx);
                if self.pause_reason == PauseReason::WaitingKeepUp && !self.at_end {
                    fx.push(Effect::Play);
                }
            }
            Input::EnginePlaying(progress) => {
                self.last_progress = progress;
                self.is_loaded = true;
                self.at_end = false;
                if progress.play == 0.0 && self.is_replay {
                    trace!("Replay restart observed, closing replay window");
                    self.is_replay = false;
                    return fx;
                }
                self.transition(PlaybackState::Playing, &mut fx);
            }
            Input::ReachedEnd => {
                fx.push(Effect::DidPlayToEnd);
                if self.auto_replay && self.pause_reason == PauseReason::WaitingKeepUp {
                    self.is_replay = true;
                    self.replay_count += 1;
                    debug!("Auto replay #{}", self.replay_count);
                    fx.push(Effect::Replay { replay_count: self.replay_count });
                    fx.push(Effect::SeekToStart);
                    fx.push(Effect::Play);
                } else {
                    self.at_end = true;
                }
            }
        }

        fx
    }

    fn transition(&mut self, next: PlaybackState, fx: &mut Vec<Effect>) {
        if next == self.state {
            trace!("State unchanged: {:?}", next);
            return;
        }
        debug!("State: {:?} -> {:?}", self.state, next);

        let visible = next.is_visible();
        if visible != self.visible {
            self.visible = visible;
            fx.push(Effect::VisibilityChanged(visible));
        }
        self.state = next.clone();
        fx.push(Effect::StateChanged(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(play: f64, buffer: f64) -> Progress {
        Progress { play, buffer }
    }

    fn state_changes(fx: &[Effect]) -> Vec<PlaybackState> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::StateChanged(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Machine that has attached, been asked to play and shown its first frame.
    fn playing() -> PlaybackStateMachine {
        let mut m = PlaybackStateMachine::new(true);
        m.apply(Input::Attached);
        m.apply(Input::Play);
        m.apply(Input::ReadyForDisplay(progress(0.0, 0.1)));
        assert_eq!(m.state(), &PlaybackState::Playing);
        m
    }

    #[test]
    fn test_state_equality() {
        let p = |a, b| PlaybackState::Paused { play_progress: a, buffer_progress: b };
        assert_eq!(p(0.3, 0.5), p(0.3, 0.5));
        assert_ne!(p(0.3, 0.5), p(0.3, 0.6));
        assert_ne!(p(0.3, 0.5), PlaybackState::Playing);

        let e1 = PlaybackState::Error(EngineError::new("d", 1, "m"));
        assert_eq!(e1, PlaybackState::Error(EngineError::new("d", 1, "m")));
        assert_ne!(e1, PlaybackState::Error(EngineError::new("d", 2, "m")));
        assert_eq!(PlaybackState::Loading, PlaybackState::Loading);
    }

    #[test]
    fn test_attach_resets_and_loads() {
        let mut m = PlaybackStateMachine::new(true);
        let fx = m.apply(Input::Attached);

        // none -> none is suppressed, loading is published
        assert_eq!(fx, vec![Effect::StateChanged(PlaybackState::Loading)]);
        assert_eq!(m.pause_reason(), PauseReason::Hidden);
        assert!(!m.is_loaded());
        assert!(!m.is_visible());
    }

    #[test]
    fn test_ready_for_display_plays_and_shows() {
        let mut m = PlaybackStateMachine::new(true);
        m.apply(Input::Attached);
        m.apply(Input::Play);
        let fx = m.apply(Input::ReadyForDisplay(Progress::ZERO));

        assert_eq!(
            fx,
            vec![
                Effect::VisibilityChanged(true),
                Effect::StateChanged(PlaybackState::Playing)
            ]
        );
        assert!(m.is_loaded());
    }

    #[test]
    fn test_duplicate_paused_suppressed() {
        let mut m = playing();
        m.apply(Input::Pause(PauseReason::UserInteraction));

        let fx1 = m.apply(Input::EnginePaused(progress(0.3, 0.5)));
        let fx2 = m.apply(Input::EnginePaused(progress(0.3, 0.5)));
        assert_eq!(state_changes(&fx1).len(), 1);
        assert!(state_changes(&fx2).is_empty());
    }

    #[test]
    fn test_buffer_progress_republishes_paused() {
        let mut m = playing();
        m.apply(Input::Pause(PauseReason::UserInteraction));
        m.apply(Input::EnginePaused(progress(0.3, 0.5)));

        let fx = m.apply(Input::BufferProgressed(progress(0.3, 0.7)));
        assert_eq!(
            state_changes(&fx),
            vec![PlaybackState::Paused { play_progress: 0.3, buffer_progress: 0.7 }]
        );
    }

    #[test]
    fn test_buffer_progress_silent_while_hidden() {
        let mut m = playing();
        m.apply(Input::Pause(PauseReason::Hidden));
        m.apply(Input::EnginePaused(progress(0.0, 0.5)));

        let fx = m.apply(Input::BufferProgressed(progress(0.0, 0.9)));
        assert!(fx.is_empty());
        assert_eq!(m.last_progress(), progress(0.0, 0.9));
    }

    #[test]
    fn test_buffer_progress_ignored_unless_paused() {
        let mut m = playing();
        let fx = m.apply(Input::BufferProgressed(progress(0.2, 0.4)));
        assert!(fx.is_empty());
    }

    #[test]
    fn test_pause_hidden_seeks_to_start() {
        let mut m = playing();
        let fx = m.apply(Input::Pause(PauseReason::Hidden));
        assert_eq!(fx, vec![Effect::Pause, Effect::SeekToStart]);

        let fx = m.apply(Input::Pause(PauseReason::UserInteraction));
        assert_eq!(fx, vec![Effect::Pause]);
    }

    #[test]
    fn test_stall_auto_resumes() {
        let mut m = playing();
        let fx = m.apply(Input::EnginePaused(progress(0.4, 0.4)));
        assert_eq!(
            fx,
            vec![
                Effect::StateChanged(PlaybackState::Paused { play_progress: 0.4, buffer_progress: 0.4 }),
                Effect::Play
            ]
        );

        let fx = m.apply(Input::KeepUpRecovered);
        assert_eq!(fx, vec![Effect::Play]);
    }

    #[test]
    fn test_paused_at_end_does_not_resume() {
        let mut m = playing();
        m.set_auto_replay(false);
        m.apply(Input::ReachedEnd);
        let fx = m.apply(Input::EnginePaused(progress(1.0, 1.0)));
        assert_eq!(
            fx,
            vec![Effect::StateChanged(PlaybackState::Paused { play_progress: 1.0, buffer_progress: 1.0 })]
        );
    }

    #[test]
    fn test_stall_at_duration_still_resumes() {
        let mut m = playing();
        let fx = m.apply(Input::EnginePaused(progress(1.0, 1.0)));
        assert_eq!(
            fx,
            vec![
                Effect::StateChanged(PlaybackState::Paused { play_progress: 1.0, buffer_progress: 1.0 }),
                Effect::Play
            ]
        );
    }

    #[test]
    fn test_play_after_end_clears_end_flag() {
        let mut m = playing();
        m.set_auto_replay(false);
        m.apply(Input::ReachedEnd);
        m.apply(Input::EnginePaused(progress(1.0, 1.0)));
        assert!(m.is_at_end());

        m.apply(Input::Play);
        assert!(!m.is_at_end());
        let fx = m.apply(Input::EnginePaused(progress(0.4, 1.0)));
        assert!(fx.contains(&Effect::Play));

        m.apply(Input::ReachedEnd);
        assert!(m.is_at_end());
        m.apply(Input::Attached);
        assert!(!m.is_at_end());
    }

    #[test]
    fn test_keep_up_ignored_after_user_pause() {
        let mut m = playing();
        m.apply(Input::Pause(PauseReason::UserInteraction));
        assert!(m.apply(Input::KeepUpRecovered).is_empty());
    }

    #[test]
    fn test_progress_zero_until_loaded() {
        let mut m = PlaybackStateMachine::new(true);
        m.apply(Input::Attached);
        m.apply(Input::Pause(PauseReason::UserInteraction));
        let fx = m.apply(Input::EnginePaused(progress(0.5, 0.8)));
        assert_eq!(
            state_changes(&fx),
            vec![PlaybackState::Paused { play_progress: 0.0, buffer_progress: 0.0 }]
        );
    }

    #[test]
    fn test_auto_replay_cycle() {
        let mut m = playing();

        for round in 1..=3 {
            let fx = m.apply(Input::ReachedEnd);
            assert_eq!(
                fx,
                vec![
                    Effect::DidPlayToEnd,
                    Effect::Replay { replay_count: round },
                    Effect::SeekToStart,
                    Effect::Play
                ]
            );
            assert!(m.is_replay());

            // Low-level pause/play of the loop restart must not surface
            assert!(m.apply(Input::EnginePaused(progress(1.0, 1.0))).is_empty());
            assert!(m.apply(Input::EnginePlaying(progress(0.0, 1.0))).is_empty());
            assert!(!m.is_replay());
        }
        assert_eq!(m.replay_count(), 3);
        assert_eq!(m.state(), &PlaybackState::Playing);
    }

    #[test]
    fn test_end_without_auto_replay() {
        let mut m = playing();
        m.set_auto_replay(false);
        let fx = m.apply(Input::ReachedEnd);
        assert_eq!(fx, vec![Effect::DidPlayToEnd]);
        assert_eq!(m.replay_count(), 0);
        assert!(!m.is_replay());
    }

    #[test]
    fn test_end_after_user_pause_does_not_loop() {
        let mut m = playing();
        m.apply(Input::Pause(PauseReason::UserInteraction));
        assert_eq!(m.apply(Input::ReachedEnd), vec![Effect::DidPlayToEnd]);
    }

    #[test]
    fn test_manual_replay_counts() {
        let mut m = playing();
        assert_eq!(m.apply(Input::Replay { reset_count: false }), vec![Effect::SeekToStart, Effect::Play]);
        m.apply(Input::Replay { reset_count: false });
        assert_eq!(m.replay_count(), 2);
        assert!(!m.is_replay());

        m.apply(Input::Replay { reset_count: true });
        assert_eq!(m.replay_count(), 0);
    }

    #[test]
    fn test_error_is_terminal() {
        let mut m = playing();
        let cause = EngineError::new("engine", -11800, "decode failed");
        let fx = m.apply(Input::Failed(cause.clone()));
        assert_eq!(
            fx,
            vec![
                Effect::VisibilityChanged(false),
                Effect::StateChanged(PlaybackState::Error(cause.clone()))
            ]
        );

        assert!(m.apply(Input::Play).is_empty());
        assert!(m.apply(Input::Replay { reset_count: false }).is_empty());
        assert!(m.apply(Input::EnginePlaying(progress(0.1, 0.2))).is_empty());
        assert_eq!(m.state(), &PlaybackState::Error(cause));

        // Fresh load recovers
        m.apply(Input::Attached);
        assert_eq!(m.state(), &PlaybackState::Loading);
    }

    #[test]
    fn test_attach_resets_replay_count() {
        let mut m = playing();
        m.apply(Input::ReachedEnd);
        assert_eq!(m.replay_count(), 1);

        m.apply(Input::Attached);
        assert_eq!(m.replay_count(), 0);
        assert!(!m.is_replay());
    }
}
