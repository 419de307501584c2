//! REELVIEW - Video playback component library
//!
//! Re-exports all modules for use by binary targets.

// Core playback (asset cache, state machine, engine bridge, player)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod widgets;

// Re-export commonly used types from core
pub use core::asset_cache::AssetCache;
pub use core::event_bus::{downcast_event, BoxedEvent, EventBus, EventEmitter};
pub use core::player::VideoPlayer;
pub use core::state::{PauseReason, PlaybackState};

pub use config::PlayerConfig;
pub use widgets::{ScrubBinding, Seeker};
