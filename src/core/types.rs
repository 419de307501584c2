//! Engine-facing value types shared by the bridge, the state machine and the player.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Load status of the engine's current item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    #[default]
    Unknown,
    ReadyToPlay,
    Failed,
}

/// Actual playback activity, distinct from the requested play/pause flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TimeControlStatus {
    #[default]
    Paused,
    WaitingToPlay,
    Playing,
}

/// Identity of one engine item (one attach of one asset).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ticket tying a seek request to its completion signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SeekTicket(pub(crate) u64);

/// A buffered span of media time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: Duration,
    pub duration: Duration,
}

impl TimeRange {
    #[must_use]
    pub fn new(start: Duration, duration: Duration) -> Self {
        Self { start, duration }
    }

    #[must_use]
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// Failure reported by the media engine.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{domain} ({code}): {message}")]
pub struct EngineError {
    pub domain: String,
    pub code: i64,
    pub message: String,
}

impl EngineError {
    pub fn new(domain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: message.into(),
        }
    }

    /// Used when the engine reports `Failed` without attaching an error.
    pub fn unknown() -> Self {
        Self::new("reelview.engine", -1, "item failed without an error")
    }
}

/// Buffering behaviour requested from the engine on every attach and reuse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferingHints {
    /// How far ahead the engine should buffer, in seconds.
    pub preferred_forward_buffer_secs: f64,
    /// Keep using network resources for live streams while paused.
    pub network_while_paused: bool,
    /// Let the engine delay playback to minimize stalls.
    pub wait_to_minimize_stalling: bool,
}

impl Default for BufferingHints {
    fn default() -> Self {
        Self {
            preferred_forward_buffer_secs: 1.0,
            network_while_paused: true,
            wait_to_minimize_stalling: false,
        }
    }
}

impl BufferingHints {
    pub fn preferred_forward_buffer(&self) -> Duration {
        Duration::from_secs_f64(self.preferred_forward_buffer_secs.max(0.0))
    }
}

/// Play/buffer fractions of the current item, both in 0..1.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Progress {
    pub play: f64,
    pub buffer: f64,
}

impl Progress {
    pub const ZERO: Progress = Progress { play: 0.0, buffer: 0.0 };

    /// Fractions of `total`; zero when the duration is unknown or empty.
    pub fn from_times(current: Duration, buffered: Duration, total: Option<Duration>) -> Self {
        let Some(total) = total.filter(|t| !t.is_zero()) else {
            return Self::ZERO;
        };
        let total = total.as_secs_f64();
        Self {
            play: fraction(current.as_secs_f64(), total),
            buffer: fraction(buffered.as_secs_f64(), total),
        }
    }
}

fn fraction(value: f64, total: f64) -> f64 {
    let f = value / total;
    if f.is_finite() { f.clamp(0.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fractions() {
        let p = Progress::from_times(
            Duration::from_secs(3),
            Duration::from_secs(5),
            Some(Duration::from_secs(10)),
        );
        assert_eq!(p.play, 0.3);
        assert_eq!(p.buffer, 0.5);
    }

    #[test]
    fn test_progress_unknown_duration_is_zero() {
        let p = Progress::from_times(Duration::from_secs(3), Duration::from_secs(5), None);
        assert_eq!(p, Progress::ZERO);

        let p = Progress::from_times(Duration::from_secs(3), Duration::ZERO, Some(Duration::ZERO));
        assert_eq!(p, Progress::ZERO);
    }

    #[test]
    fn test_progress_clamped() {
        let p = Progress::from_times(
            Duration::from_secs(12),
            Duration::from_secs(20),
            Some(Duration::from_secs(10)),
        );
        assert_eq!(p.play, 1.0);
        assert_eq!(p.buffer, 1.0);
    }

    #[test]
    fn test_engine_error_equality_and_display() {
        let a = EngineError::new("AVFoundationErrorDomain", -11800, "operation could not be completed");
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, EngineError::new("AVFoundationErrorDomain", -11828, "cannot open"));
        assert_eq!(
            a.to_string(),
            "AVFoundationErrorDomain (-11800): operation could not be completed"
        );
    }
}
