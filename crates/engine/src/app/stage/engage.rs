use std::time::Duration;

use kurbo::Point;
use tracing::info;

use super::{FrameClock, Interactive, PointerResponse, Stage, Timed};
use crate::app::audio::{AudioSink, SilentAudio};
use crate::app::rendering::{paused_overlay, Canvas};
use crate::app::scene::{Scene, SceneError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    /// System-paused: frames still run with a zero delta and audio is silenced.
    Waiting,
    Playing,
}

/// Visibility-driven pause layered over the running/stopped clock.
pub trait Engaged: Interactive {
    fn play_state(&self) -> PlayState;
    fn visibility_changed(&mut self, visible: bool, now: Duration);
}

pub struct EngageScene<S> {
    inner: S,
    engaged: bool,
    waiting: bool,
    system_paused: bool,
    audio: Box<dyn AudioSink>,
    pausing: Option<Scene>,
}

impl<S: Interactive> EngageScene<S> {
    /// Wraps `inner` with the default paused overlay and a silent audio sink.
    pub fn new(inner: S) -> Result<Self, SceneError> {
        Ok(Self {
            inner,
            engaged: true,
            waiting: false,
            system_paused: false,
            audio: Box::new(SilentAudio::default()),
            pausing: Some(paused_overlay()?),
        })
    }

    pub fn with_audio(mut self, audio: impl AudioSink + 'static) -> Self {
        self.audio = Box::new(audio);
        self
    }

    pub fn with_pausing(mut self, pausing: Option<Scene>) -> Self {
        self.pausing = pausing;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Scene drawn over the frozen main tree while waiting.
    pub fn pausing(&self) -> Option<&Scene> {
        self.pausing.as_ref()
    }

    pub fn pausing_mut(&mut self) -> Option<&mut Scene> {
        self.pausing.as_mut()
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Couples play state to visibility and audio.
    pub fn engage(&mut self) {
        self.engaged = true;
    }

    pub fn disengage(&mut self) {
        self.engaged = false;
        self.system_paused = false;
    }

    /// Enters `waiting`, starting the clock if it was stopped.
    pub fn wait(&mut self, now: Duration) {
        let from = self.play_state();
        if from == PlayState::Playing && self.engaged {
            self.audio.pause_music();
        }
        self.waiting = true;
        self.system_paused = false;
        self.inner.start(now);
        self.note_transition(from);
    }

    fn note_transition(&self, from: PlayState) {
        let to = self.play_state();
        if from != to {
            info!(from = ?from, to = ?to, "play_state_changed");
        }
    }

    fn frame_waiting(&mut self, delta: Duration) -> Result<(), SceneError> {
        self.inner.frame(Duration::ZERO)?;
        let Some(pausing) = self.pausing.as_mut() else {
            return Ok(());
        };

        let target = self.inner.scene_mut().take_target();
        let lent = target.is_some();
        if lent {
            pausing.set_target(target);
        }
        let result = pausing.frame(delta);
        if lent {
            let target = pausing.take_target();
            self.inner.scene_mut().set_target(target);
        }
        result
    }
}

impl<S: Interactive> Stage for EngageScene<S> {
    fn scene(&self) -> &Scene {
        self.inner.scene()
    }

    fn scene_mut(&mut self) -> &mut Scene {
        self.inner.scene_mut()
    }

    fn frame(&mut self, delta: Duration) -> Result<(), SceneError> {
        if self.play_state() == PlayState::Waiting {
            self.frame_waiting(delta)
        } else {
            self.inner.frame(delta)
        }
    }

    fn dispose(&mut self) -> Option<Box<dyn Canvas>> {
        self.stop();
        self.inner.dispose()
    }
}

impl<S: Interactive> Timed for EngageScene<S> {
    fn clock(&self) -> &FrameClock {
        self.inner.clock()
    }

    fn clock_mut(&mut self) -> &mut FrameClock {
        self.inner.clock_mut()
    }

    fn start(&mut self, now: Duration) {
        let from = self.play_state();
        if from == PlayState::Playing {
            return;
        }
        if from == PlayState::Stopped {
            self.wait(now);
        }
        self.waiting = false;
        if self.engaged {
            self.audio.continue_music();
        }
        self.note_transition(from);
    }

    fn stop(&mut self) {
        let from = self.play_state();
        if from == PlayState::Playing {
            let now = self.clock().now();
            self.wait(now);
        }
        self.inner.stop();
        self.note_transition(from);
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }
}

impl<S: Interactive> Interactive for EngageScene<S> {
    fn pointer_down(&mut self, at: Point, now: Duration) -> Result<PointerResponse, SceneError> {
        if self.play_state() == PlayState::Waiting {
            self.start(now);
            return Ok(PointerResponse {
                suppress_default: true,
            });
        }
        self.inner.pointer_down(at, now)
    }

    fn pointer_move(&mut self, at: Point) -> Result<PointerResponse, SceneError> {
        self.inner.pointer_move(at)
    }

    fn pointer_up(&mut self, now: Duration) -> Result<PointerResponse, SceneError> {
        self.inner.pointer_up(now)
    }
}

impl<S: Interactive> Engaged for EngageScene<S> {
    fn play_state(&self) -> PlayState {
        if !self.inner.is_running() {
            PlayState::Stopped
        } else if self.waiting {
            PlayState::Waiting
        } else {
            PlayState::Playing
        }
    }

    fn visibility_changed(&mut self, visible: bool, now: Duration) {
        if !self.engaged {
            return;
        }
        if !visible {
            if self.play_state() != PlayState::Stopped {
                self.wait(now);
                self.system_paused = true;
            }
        } else if self.system_paused {
            self.system_paused = false;
            self.start(now);
        }
    }
}
