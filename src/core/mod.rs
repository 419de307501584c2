//! Core playback modules - asset cache, state machine, engine bridge, player
//!
//! These modules form the playback component, independent of any UI toolkit.

pub mod asset_cache;
pub mod bridge;
pub mod engine;
pub mod event_bus;
pub mod player;
pub mod player_events;
pub mod sim;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use asset_cache::{AssetCache, CacheStats};
pub use bridge::EngineObserverBridge;
pub use engine::{AssetHandle, EngineInstance, EngineSignal, MediaEngine, SignalSink};
pub use event_bus::EventBus;
pub use player::VideoPlayer;
pub use state::{PauseReason, PlaybackState, PlaybackStateMachine};
pub use types::{BufferingHints, EngineError, ItemStatus, Progress, TimeControlStatus, TimeRange};
