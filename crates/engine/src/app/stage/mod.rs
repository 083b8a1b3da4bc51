//! Wrapper chain that layers a clock, pointer dispatch, engagement and
//! responsive sizing over a [`Scene`].
//!
//! Each wrapper owns the next inner layer and forwards whatever it does not
//! special-case, so `ResponsiveScene<EngageScene<InteractScene<TimeScene>>>`
//! reads outside-in as the override order.

mod engage;
mod interact;
mod responsive;
mod time;

use std::time::Duration;

use tracing::info;

pub use engage::{EngageScene, Engaged, PlayState};
pub use interact::{InteractScene, Interactive, PointerResponse, DRAG_THRESHOLD, TAP_WINDOW};
pub use responsive::{ResponsiveScene, DEFAULT_INTERNAL_PIXEL_RATIO};
pub use time::{FrameClock, FrameTick, TimeScene, DEFAULT_MAX_RATE, DEFAULT_MIN_RATE};

use crate::app::rendering::Canvas;
use crate::app::scene::{Scene, SceneCommand, SceneError};

/// Anything that owns a scene and can advance it by one frame.
pub trait Stage {
    fn scene(&self) -> &Scene;
    fn scene_mut(&mut self) -> &mut Scene;

    fn frame(&mut self, delta: Duration) -> Result<(), SceneError> {
        self.scene_mut().frame(delta)
    }

    /// Releases the render target. The stage stays usable but draws nothing.
    fn dispose(&mut self) -> Option<Box<dyn Canvas>> {
        self.scene_mut().take_target()
    }
}

impl Stage for Scene {
    fn scene(&self) -> &Scene {
        self
    }

    fn scene_mut(&mut self) -> &mut Scene {
        self
    }
}

/// A stage driven by host timestamps through a [`FrameClock`].
pub trait Timed: Stage {
    fn clock(&self) -> &FrameClock;
    fn clock_mut(&mut self) -> &mut FrameClock;

    fn start(&mut self, now: Duration) {
        self.clock_mut().start(now);
    }

    fn stop(&mut self) {
        self.clock_mut().stop();
    }

    fn is_running(&self) -> bool {
        self.clock().is_running()
    }

    /// Host callback. Runs one frame when the clock lets the timestamp
    /// through, then applies start/stop requests raised by hooks.
    fn poll(&mut self, timestamp: Duration) -> Result<Option<FrameTick>, SceneError> {
        let Some(tick) = self.clock_mut().advance(timestamp) else {
            return Ok(None);
        };
        let result = self.frame(tick.delta);
        self.run_commands(timestamp);
        result.map(|()| Some(tick))
    }

    /// Redraws the current state without a timestamp: runs one frame with a
    /// zero delta whether or not the clock is armed.
    fn tick(&mut self) -> Result<(), SceneError> {
        let now = self.clock().now();
        let result = self.frame(Duration::ZERO);
        self.run_commands(now);
        result
    }

    /// Applies start/stop requests queued by hooks outside of a poll,
    /// e.g. from an interaction handler.
    fn run_commands(&mut self, now: Duration) {
        for command in self.scene_mut().take_clock_commands() {
            match command {
                SceneCommand::Start => self.start(now),
                SceneCommand::Stop => self.stop(),
                SceneCommand::HandOff => {}
            }
        }
    }
}

/// Moves the render target from `from` to `to` and starts `to`.
///
/// The source gives up the target before the destination receives it, so
/// the two never draw to the same surface.
pub fn hand_off<A, B>(from: &mut A, to: &mut B, now: Duration)
where
    A: Timed + ?Sized,
    B: Timed + ?Sized,
{
    let display = from.scene().display_size();
    let ratio = from.scene().device_pixel_ratio();
    let target = from.dispose();
    let handed_target = target.is_some();

    let scene = to.scene_mut();
    scene.set_display_size(display);
    scene.set_device_pixel_ratio(ratio);
    scene.set_target(target);
    to.start(now);
    info!(handed_target, now_ms = now.as_millis() as u64, "hand_off");
}
