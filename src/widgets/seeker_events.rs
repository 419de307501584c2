//! Seeker widget events.

/// Drag on the bar started.
#[derive(Clone, Debug)]
pub struct ScrubStartEvent;

/// Drag released at `value` (0..1).
#[derive(Clone, Debug, PartialEq)]
pub struct ScrubEndEvent {
    pub value: f64,
}

/// Single tap on the bar moved the value.
#[derive(Clone, Debug, PartialEq)]
pub struct BarTappedEvent {
    pub value: f64,
}

/// Drag or tap ended at the maximum value.
#[derive(Clone, Debug)]
pub struct ReachedMaxValueEvent;
