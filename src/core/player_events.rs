//! Player notifications published on the event bus.

use super::state::PlaybackState;

/// Playback state changed (duplicates are never published).
#[derive(Clone, Debug, PartialEq)]
pub struct StateChangedEvent {
    pub state: PlaybackState,
}

/// The view became visible (`true`) or hidden (`false`).
#[derive(Clone, Debug, PartialEq)]
pub struct VisibilityChangedEvent(pub bool);

/// Current item played to its end.
#[derive(Clone, Debug)]
pub struct DidPlayToEndEvent;

/// Automatic loop restart; `replay_count` is the count after this restart.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayEvent {
    pub replay_count: u32,
}
