//! Seeker <-> player glue.
//!
//! `ScrubBinding` reacts to seeker events on behalf of a player it does not
//! own. Every entry point upgrades the weak reference first; a dropped or
//! currently busy player turns the call into a logged no-op.
//!
//! - scrub start: pause (user interaction)
//! - scrub end / tap: seek to the fraction, then resume
//! - reached max value: logged only

use log::{debug, info, trace};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::seeker::Seeker;
use super::seeker_events::{BarTappedEvent, ReachedMaxValueEvent, ScrubEndEvent, ScrubStartEvent};
use crate::core::event_bus::{BoxedEvent, downcast_event};
use crate::core::player::VideoPlayer;
use crate::core::state::PauseReason;

#[derive(Clone, Debug)]
pub struct ScrubBinding {
    player: Weak<RefCell<VideoPlayer>>,
}

impl ScrubBinding {
    pub fn new(player: &Rc<RefCell<VideoPlayer>>) -> Self {
        Self { player: Rc::downgrade(player) }
    }

    pub fn is_alive(&self) -> bool {
        self.player.strong_count() > 0
    }

    /// Run `f` on the player if it is still around and not borrowed.
    fn with_player<R>(&self, f: impl FnOnce(&mut VideoPlayer) -> R) -> Option<R> {
        let Some(player) = self.player.upgrade() else {
            debug!("Scrub ignored: player gone");
            return None;
        };
        let Ok(mut player) = player.try_borrow_mut() else {
            debug!("Scrub ignored: player busy");
            return None;
        };
        Some(f(&mut player))
    }

    pub fn scrub_started(&self) {
        self.with_player(|p| p.pause(PauseReason::UserInteraction));
    }

    /// Seek to `value` (0..1) and resume. `completion` runs exactly once,
    /// with `false` if the player is gone.
    pub fn scrub_ended(&self, value: f64, completion: impl FnOnce(bool) + 'static) {
        let mut completion = Some(completion);
        self.with_player(|p| {
            if let Some(done) = completion.take() {
                p.seek_to_fraction(value, done);
            }
            p.play();
        });
        if let Some(done) = completion {
            done(false);
        }
    }

    pub fn bar_tapped(&self, value: f64) {
        self.scrub_ended(value, |ok| trace!("Tap seek finished: {}", ok));
    }

    pub fn reached_max(&self) {
        if self.is_alive() {
            info!("Seeker released at the end");
        }
    }

    /// Route one polled event. Returns true if it was a seeker event.
    pub fn handle(&self, event: &BoxedEvent) -> bool {
        if downcast_event::<ScrubStartEvent>(event).is_some() {
            self.scrub_started();
        } else if let Some(e) = downcast_event::<ScrubEndEvent>(event) {
            self.scrub_ended(e.value, |ok| trace!("Scrub seek finished: {}", ok));
        } else if let Some(e) = downcast_event::<BarTappedEvent>(event) {
            self.bar_tapped(e.value);
        } else if downcast_event::<ReachedMaxValueEvent>(event).is_some() {
            self.reached_max();
        } else {
            return false;
        }
        true
    }

    /// Copy player progress into `seeker`, unless the user is dragging.
    pub fn sync(&self, seeker: &mut Seeker) {
        if seeker.is_tracking() {
            return;
        }
        let Some(player) = self.player.upgrade() else {
            return;
        };
        let Ok(player) = player.try_borrow() else {
            return;
        };
        seeker.set_value(player.play_progress());
        seeker.set_buffer_value(player.buffer_progress());
        seeker.display_thumb(player.is_loaded());
    }
}
