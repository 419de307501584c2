//! Media engine capability: the black box that demuxes, decodes and renders.
//!
//! The playback core never talks to a platform engine directly. It asks a
//! [`MediaEngine`] for assets and instances, drives instances through
//! [`EngineInstance`], and receives property changes through a [`SignalSink`].
//!
//! # Signal delivery
//!
//! Engines may call the sink from any thread. Every call is turned into an
//! [`EngineSignal`] and pushed into a channel owned by the observer bridge,
//! which drains it on the UI context. When the bridge tears an attachment
//! down the channel disconnects and later calls on the old sink are dropped.

use crossbeam_channel::Sender;
use log::trace;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::types::{
    BufferingHints, EngineError, ItemId, ItemStatus, SeekTicket, TimeControlStatus, TimeRange,
};

/// Opaque, potentially expensive decoded-asset representation.
///
/// Cloning is cheap; equality is identity of the underlying asset.
#[derive(Clone)]
pub struct AssetHandle {
    id: Uuid,
    url: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl AssetHandle {
    pub fn new<T: Any + Send + Sync>(url: &str, asset: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: Arc::from(url),
            inner: Arc::new(asset),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Locator the asset was built from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Engine-specific view of the asset.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl PartialEq for AssetHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for AssetHandle {}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("id", &self.id)
            .field("url", &self.url)
            .finish()
    }
}

/// Factory side of the engine.
pub trait MediaEngine {
    /// Build the decodable asset for `url`. Called only on cache miss.
    fn open_asset(&self, url: &str) -> AssetHandle;

    /// Construct a new engine instance playing `asset`.
    fn attach(&self, url: &str, asset: AssetHandle) -> Box<dyn EngineInstance>;
}

/// One engine instance with one current item.
pub trait EngineInstance {
    fn item_id(&self) -> ItemId;

    fn url(&self) -> &str;

    // -- transport --

    fn play(&mut self);

    fn pause(&mut self);

    /// Move the playhead. The engine must later report
    /// [`SignalSink::seek_finished`] for `ticket` exactly once, with
    /// `success = false` when a later seek interrupted this one.
    fn seek(&mut self, to: Duration, ticket: SeekTicket);

    // -- observable properties --

    fn rate(&self) -> f32;

    fn status(&self) -> ItemStatus;

    fn error(&self) -> Option<EngineError>;

    fn time_control_status(&self) -> TimeControlStatus;

    fn is_ready_for_display(&self) -> bool;

    fn is_playback_likely_to_keep_up(&self) -> bool;

    fn current_time(&self) -> Duration;

    fn duration(&self) -> Option<Duration>;

    fn loaded_time_ranges(&self) -> Vec<TimeRange>;

    // -- tuning --

    fn apply_buffering_hints(&mut self, hints: &BufferingHints);

    fn volume(&self) -> f32;

    fn set_volume(&mut self, volume: f32);

    fn is_muted(&self) -> bool;

    fn set_muted(&mut self, muted: bool);

    // -- observation --

    /// Install the sink for all signals, replacing any previous one.
    /// `None` cancels every subscription.
    fn observe(&mut self, sink: Option<SignalSink>);
}

/// Raw property-change notifications, as marshalled onto the UI context.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineSignal {
    LoadedTimeRangesChanged,
    StatusChanged(ItemStatus),
    KeepUpChanged(bool),
    ReadyForDisplayChanged(bool),
    TimeControlStatusChanged(TimeControlStatus),
    DidPlayToEnd(ItemId),
    SeekFinished { ticket: SeekTicket, success: bool },
}

/// Per-signal subscription interface handed to an engine instance.
#[derive(Clone, Debug)]
pub struct SignalSink {
    tx: Sender<EngineSignal>,
}

impl SignalSink {
    pub(crate) fn new(tx: Sender<EngineSignal>) -> Self {
        Self { tx }
    }

    pub fn loaded_time_ranges_changed(&self) {
        self.send(EngineSignal::LoadedTimeRangesChanged);
    }

    pub fn status_changed(&self, status: ItemStatus) {
        self.send(EngineSignal::StatusChanged(status));
    }

    pub fn keep_up_changed(&self, likely: bool) {
        self.send(EngineSignal::KeepUpChanged(likely));
    }

    pub fn ready_for_display_changed(&self, ready: bool) {
        self.send(EngineSignal::ReadyForDisplayChanged(ready));
    }

    pub fn time_control_status_changed(&self, status: TimeControlStatus) {
        self.send(EngineSignal::TimeControlStatusChanged(status));
    }

    pub fn did_play_to_end(&self, item: ItemId) {
        self.send(EngineSignal::DidPlayToEnd(item));
    }

    pub fn seek_finished(&self, ticket: SeekTicket, success: bool) {
        self.send(EngineSignal::SeekFinished { ticket, success });
    }

    fn send(&self, signal: EngineSignal) {
        if let Err(e) = self.tx.send(signal) {
            trace!("Signal dropped, observer gone: {:?}", e.into_inner());
        }
    }
}
