use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Stage, Timed};
use crate::app::rendering::Canvas;
use crate::app::scene::{Scene, SceneError};

pub const DEFAULT_MAX_RATE: u32 = 120;
pub const DEFAULT_MIN_RATE: u32 = 10;

/// Result of a poll that let a frame through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    pub delta: Duration,
    /// The raw gap exceeded the min-rate frame time and was cut down.
    pub clamped: bool,
}

/// Stopped/running state machine turning host timestamps into frame deltas.
#[derive(Debug, Clone)]
pub struct FrameClock {
    max_rate: u32,
    min_rate: u32,
    now: Duration,
    running: bool,
    debug_stop: bool,
    ticks: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RATE, DEFAULT_MIN_RATE)
    }
}

impl FrameClock {
    pub fn new(max_rate: u32, min_rate: u32) -> Self {
        Self {
            max_rate: normalize_rate(max_rate, "max_rate"),
            min_rate: normalize_rate(min_rate, "min_rate"),
            now: Duration::ZERO,
            running: false,
            debug_stop: false,
            ticks: 0,
        }
    }

    pub fn frame_time_for(rate: u32) -> Duration {
        Duration::from_millis(1000 / u64::from(rate.max(1)))
    }

    pub fn max_rate(&self) -> u32 {
        self.max_rate
    }

    pub fn set_max_rate(&mut self, rate: u32) {
        self.max_rate = normalize_rate(rate, "max_rate");
    }

    pub fn min_rate(&self) -> u32 {
        self.min_rate
    }

    pub fn set_min_rate(&mut self, rate: u32) {
        self.min_rate = normalize_rate(rate, "min_rate");
    }

    /// Timestamp of the last frame that ran (or of the last start).
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Freezes frame delivery without stopping the clock.
    pub fn set_debug_stop(&mut self, debug_stop: bool) {
        self.debug_stop = debug_stop;
    }

    pub fn debug_stop(&self) -> bool {
        self.debug_stop
    }

    pub fn start(&mut self, now: Duration) {
        if self.running {
            return;
        }
        self.running = true;
        self.now = now;
        info!(
            now_ms = now.as_millis() as u64,
            max_rate = self.max_rate,
            min_rate = self.min_rate,
            "loop_started"
        );
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        info!(ticks = self.ticks, "loop_stopped");
    }

    /// Returns the delta for a frame at `timestamp`, or `None` when the
    /// timestamp is coalesced by the max rate or the clock is not delivering.
    pub fn advance(&mut self, timestamp: Duration) -> Option<FrameTick> {
        if !self.running || self.debug_stop {
            return None;
        }
        let elapsed = timestamp.saturating_sub(self.now);
        if elapsed < Self::frame_time_for(self.max_rate) {
            return None;
        }

        let limit = Self::frame_time_for(self.min_rate);
        let clamped = elapsed > limit;
        let delta = elapsed.min(limit);
        if clamped {
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                delta_ms = delta.as_millis() as u64,
                "frame_delta_clamped"
            );
        }
        self.now = timestamp;
        self.ticks = self.ticks.saturating_add(1);
        Some(FrameTick { delta, clamped })
    }
}

fn normalize_rate(rate: u32, name: &'static str) -> u32 {
    if rate == 0 {
        warn!(setting = name, "rate must be positive; using 1");
        1
    } else {
        rate
    }
}

/// Innermost wrapper: adds the frame clock to a stage.
pub struct TimeScene<S = Scene> {
    inner: S,
    clock: FrameClock,
}

impl<S: Stage> TimeScene<S> {
    pub fn new(inner: S) -> Self {
        Self::with_clock(inner, FrameClock::default())
    }

    pub fn with_clock(inner: S, clock: FrameClock) -> Self {
        Self { inner, clock }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: Stage> Stage for TimeScene<S> {
    fn scene(&self) -> &Scene {
        self.inner.scene()
    }

    fn scene_mut(&mut self) -> &mut Scene {
        self.inner.scene_mut()
    }

    fn frame(&mut self, delta: Duration) -> Result<(), SceneError> {
        self.inner.frame(delta)
    }

    fn dispose(&mut self) -> Option<Box<dyn Canvas>> {
        self.clock.stop();
        self.inner.dispose()
    }
}

impl<S: Stage> Timed for TimeScene<S> {
    fn clock(&self) -> &FrameClock {
        &self.clock
    }

    fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }
}
