//! Seeker bar - headless scrub/progress control.
//!
//! Holds value (played fraction), buffer value, colours and geometry; the
//! host renders from [`Seeker::thumb_rect`], [`Seeker::progress_width`] and
//! [`Seeker::buffer_width`] and forwards touches in local coordinates.
//!
//! ```text
//!   |=====progress=====(thumb)----buffer----.............|
//!   0                                                  width
//! ```
//!
//! The whole frame is the touch area of the track. Dragging maps the touch x
//! to a value (thumb centre under the finger); see [`Seeker::value_at`].

use log::trace;

use super::seeker_events::{BarTappedEvent, ReachedMaxValueEvent, ScrubEndEvent, ScrubStartEvent};
use crate::core::event_bus::{Event, EventEmitter};

pub const MIN_VALUE: f64 = 0.0;
pub const MAX_VALUE: f64 = 1.0;

/// Straight RGBA colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const CLEAR: Rgba = Rgba([0, 0, 0, 0]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba([r, g, b, 255])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SeekerColors {
    pub thumb: Rgba,
    pub track: Rgba,
    pub buffer: Rgba,
    pub progress: Rgba,
}

/// Axis-aligned rectangle in seeker-local points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.w && y >= self.y && y <= self.y + self.h
    }

    pub fn expand(&self, by: f32) -> Rect {
        Rect {
            x: self.x - by,
            y: self.y - by,
            w: self.w + by * 2.0,
            h: self.h + by * 2.0,
        }
    }
}

#[derive(Debug)]
pub struct Seeker {
    value: f64,
    buffer_value: f64,
    width: f32,
    height: f32,
    pub thumb_width: f32,
    pub track_y: f32,
    pub track_height: f32,
    /// Extra hit margin around the thumb
    pub extra_touch: f32,
    pub colors: SeekerColors,
    thumb_visible: bool,
    tracking: bool,
    emitter: Option<EventEmitter>,
}

impl Seeker {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            value: MIN_VALUE,
            buffer_value: MIN_VALUE,
            width,
            height,
            thumb_width: 20.0,
            track_y: 24.0,
            track_height: 2.0,
            extra_touch: 5.0,
            colors: SeekerColors::default(),
            thumb_visible: true,
            tracking: false,
            emitter: None,
        }
    }

    /// Publish scrub events through `emitter`.
    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = bound(value);
    }

    pub fn buffer_value(&self) -> f64 {
        self.buffer_value
    }

    pub fn set_buffer_value(&mut self, value: f64) {
        self.buffer_value = bound(value);
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn display_thumb(&mut self, visible: bool) {
        self.thumb_visible = visible;
    }

    pub fn is_thumb_visible(&self) -> bool {
        self.thumb_visible
    }

    // ========== Geometry ==========

    fn span(&self) -> f32 {
        self.width - self.thumb_width
    }

    /// X of the thumb centre for `value`.
    pub fn thumb_center(&self, value: f64) -> f32 {
        self.span() * bound(value) as f32 + self.thumb_width / 2.0
    }

    pub fn thumb_rect(&self) -> Rect {
        Rect {
            x: self.thumb_center(self.value) - self.thumb_width / 2.0,
            y: self.track_y - (self.thumb_width - self.track_height) / 2.0,
            w: self.thumb_width,
            h: self.thumb_width,
        }
    }

    pub fn track_rect(&self) -> Rect {
        Rect { x: 0.0, y: self.track_y, w: self.width, h: self.track_height }
    }

    /// Width of the played part of the track (up to the thumb's left edge).
    pub fn progress_width(&self) -> f32 {
        self.thumb_center(self.value) - self.thumb_width / 2.0
    }

    /// Width of the buffered part of the track.
    pub fn buffer_width(&self) -> f32 {
        self.width * self.buffer_value as f32
    }

    /// Value under touch x. Degenerate widths map to the minimum.
    pub fn value_at(&self, x: f32) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return MIN_VALUE;
        }
        bound(f64::from((x - self.thumb_width / 2.0) / span))
    }

    fn frame(&self) -> Rect {
        Rect { x: 0.0, y: 0.0, w: self.width, h: self.height }
    }

    /// Touch lands on the thumb (with its extra margin).
    pub fn hits_thumb(&self, x: f32, y: f32) -> bool {
        self.thumb_visible && self.thumb_rect().expand(self.extra_touch).contains(x, y)
    }

    // ========== Interaction ==========

    /// Touch down. Returns whether a drag is now being tracked.
    pub fn begin_tracking(&mut self, x: f32, y: f32) -> bool {
        if self.frame().contains(x, y) {
            self.tracking = true;
            self.emit(ScrubStartEvent);
        }
        self.tracking
    }

    /// Touch moved. Returns true to keep receiving moves.
    pub fn continue_tracking(&mut self, x: f32) -> bool {
        if self.tracking {
            self.value = self.value_at(x);
            trace!("Seeker value {:.3}", self.value);
        }
        true
    }

    /// Touch up. No-op unless a drag is tracked.
    pub fn end_tracking(&mut self) {
        if !self.tracking {
            return;
        }
        self.tracking = false;
        self.emit(ScrubEndEvent { value: self.value });
        self.emit_if_at_max();
    }

    /// Single tap: jump to the tapped value.
    pub fn tap(&mut self, x: f32, y: f32) -> bool {
        if !self.frame().contains(x, y) {
            return false;
        }
        self.value = self.value_at(x);
        self.tracking = false;
        self.emit(BarTappedEvent { value: self.value });
        self.emit_if_at_max();
        true
    }

    fn emit_if_at_max(&self) {
        if self.value == MAX_VALUE {
            self.emit(ReachedMaxValueEvent);
        }
    }

    fn emit<E: Event + Clone>(&self, event: E) {
        if let Some(emitter) = &self.emitter {
            emitter.emit(event);
        }
    }
}

fn bound(v: f64) -> f64 {
    if v.is_nan() {
        return MIN_VALUE;
    }
    v.clamp(MIN_VALUE, MAX_VALUE)
}
