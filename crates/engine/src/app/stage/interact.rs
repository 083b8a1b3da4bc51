use std::time::Duration;

use kurbo::Point;
use tracing::debug;

use super::{FrameClock, Stage, Timed};
use crate::app::rendering::Canvas;
use crate::app::scene::{EntityId, Interaction, Scene, SceneError, Senses, INTERACTOR_SLOT};

/// Manhattan distance, in display units, a pointer must exceed to start a drag.
pub const DRAG_THRESHOLD: f64 = 10.0;
/// Longest press that still counts as a tap.
pub const TAP_WINDOW: Duration = Duration::from_millis(750);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerResponse {
    /// A sensor claimed the session; the host should skip its default
    /// gesture handling.
    pub suppress_default: bool,
}

impl PointerResponse {
    fn claimed(suppress_default: bool) -> Self {
        Self { suppress_default }
    }
}

/// Pointer events in display units, as delivered by the host.
pub trait Interactive: Timed {
    fn pointer_down(&mut self, at: Point, now: Duration) -> Result<PointerResponse, SceneError>;
    fn pointer_move(&mut self, at: Point) -> Result<PointerResponse, SceneError>;
    fn pointer_up(&mut self, now: Duration) -> Result<PointerResponse, SceneError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Claim {
    id: EntityId,
    layer: Option<i32>,
}

#[derive(Debug, Default)]
struct Claims {
    tap: Option<Claim>,
    drag: Option<Claim>,
}

impl Claims {
    fn any(&self) -> bool {
        self.tap.is_some() || self.drag.is_some()
    }
}

#[derive(Debug)]
struct PointerSession {
    started_at: Duration,
    /// Where the pointer went down, display units.
    origin: Point,
    /// Last position a drag was reported from, root space.
    anchor: Point,
    dragging: bool,
    claims: Claims,
}

/// Adds hit-testing and tap/drag disambiguation to a timed stage.
pub struct InteractScene<S> {
    inner: S,
    session: Option<PointerSession>,
}

impl<S: Timed> InteractScene<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            session: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn is_dragging(&self) -> bool {
        self.session
            .as_ref()
            .map(|session| session.dragging)
            .unwrap_or(false)
    }

    /// Maps a display-unit position to root space.
    fn to_scene_space(&self, at: Point) -> Point {
        let ratio = self.inner.scene().canvas_ratio();
        Point::new(at.x * ratio.x, at.y * ratio.y)
    }
}

impl<S: Timed> Stage for InteractScene<S> {
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
        self.session = None;
        self.inner.dispose()
    }
}

impl<S: Timed> Timed for InteractScene<S> {
    fn clock(&self) -> &FrameClock {
        self.inner.clock()
    }

    fn clock_mut(&mut self) -> &mut FrameClock {
        self.inner.clock_mut()
    }

    fn start(&mut self, now: Duration) {
        self.inner.start(now);
    }

    fn stop(&mut self) {
        self.session = None;
        self.inner.stop();
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }
}

impl<S: Timed> Interactive for InteractScene<S> {
    fn pointer_down(&mut self, at: Point, now: Duration) -> Result<PointerResponse, SceneError> {
        if !self.inner.is_running() {
            return Ok(PointerResponse::default());
        }
        let point = self.to_scene_space(at);
        let scene = self.inner.scene_mut();
        let mut claims = Claims::default();
        let root = scene.root();
        search_sensors(scene, root, point, &mut claims);
        let claimed = claims.any();
        debug!(
            x = point.x,
            y = point.y,
            tap = claims.tap.is_some(),
            drag = claims.drag.is_some(),
            "pointer_down"
        );

        let touch = claims.tap.map(|claim| claim.id);
        self.session = Some(PointerSession {
            started_at: now,
            origin: at,
            anchor: point,
            dragging: false,
            claims,
        });
        if let Some(sensor) = touch {
            notify_at(scene, sensor, point, Interaction::Touch)?;
        }
        Ok(PointerResponse::claimed(claimed))
    }

    fn pointer_move(&mut self, at: Point) -> Result<PointerResponse, SceneError> {
        if !self.inner.is_running() {
            return Ok(PointerResponse::default());
        }
        let point = self.to_scene_space(at);
        let Some(session) = self.session.as_mut() else {
            return Ok(PointerResponse::default());
        };
        let claimed = session.claims.any();

        if !session.dragging {
            let distance = (at.x - session.origin.x).abs() + (at.y - session.origin.y).abs();
            if distance <= DRAG_THRESHOLD {
                return Ok(PointerResponse::claimed(claimed));
            }
            session.dragging = true;
            debug!(distance, "drag_started");
        }

        let vector = point - session.anchor;
        session.anchor = point;
        let Some(sensor) = session.claims.drag.map(|claim| claim.id) else {
            return Ok(PointerResponse::claimed(claimed));
        };

        let scene = self.inner.scene_mut();
        if !scene.is_live(sensor) {
            return Ok(PointerResponse::claimed(claimed));
        }
        let local = match scene.parent_of(sensor) {
            Some(parent) => scene.vector_from_root(parent, vector),
            None => Some(vector),
        };
        if let Some(local) = local {
            dispatch(scene, sensor, Interaction::Drag(local))?;
        }
        Ok(PointerResponse::claimed(claimed))
    }

    fn pointer_up(&mut self, now: Duration) -> Result<PointerResponse, SceneError> {
        if !self.inner.is_running() {
            return Ok(PointerResponse::default());
        }
        let Some(session) = self.session.take() else {
            return Ok(PointerResponse::default());
        };
        let claimed = session.claims.any();
        let held = now.saturating_sub(session.started_at);
        if session.dragging || held > TAP_WINDOW {
            return Ok(PointerResponse::claimed(claimed));
        }
        if let Some(claim) = session.claims.tap {
            notify_at(self.inner.scene_mut(), claim.id, session.anchor, Interaction::Tap)?;
        }
        Ok(PointerResponse::claimed(claimed))
    }
}

/// Pre-order search for sensors under `point`, given in the parent space of `id`.
fn search_sensors(scene: &Scene, id: EntityId, point: Point, claims: &mut Claims) {
    if scene
        .scale(id)
        .is_some_and(|scale| scale.x == 0.0 || scale.y == 0.0)
    {
        return;
    }
    let local = scene.to_local(id, point);
    if let Some(interactor) = scene.interactor(id) {
        let senses = interactor.sense(local);
        let layer = scene.layer(id);
        if senses.contains(Senses::TAP) {
            claim(&mut claims.tap, id, layer);
        }
        if senses.contains(Senses::DRAG) {
            claim(&mut claims.drag, id, layer);
        }
    }
    for child in scene.children_of(id) {
        search_sensors(scene, child, local, claims);
    }
}

// A layerless candidate never displaces a holder; equal layers keep the first found.
fn claim(slot: &mut Option<Claim>, id: EntityId, layer: Option<i32>) {
    let replace = match (slot.as_ref(), layer) {
        (None, _) => true,
        (Some(holder), Some(layer)) => holder.layer.unwrap_or(-1) < layer,
        (Some(_), None) => false,
    };
    if replace {
        *slot = Some(Claim { id, layer });
    }
}

fn notify_at(
    scene: &mut Scene,
    sensor: EntityId,
    point: Point,
    make: fn(Point) -> Interaction,
) -> Result<(), SceneError> {
    if !scene.is_live(sensor) {
        return Ok(());
    }
    match scene.from_root(sensor, point) {
        Some(local) => dispatch(scene, sensor, make(local)),
        None => Ok(()),
    }
}

fn dispatch(scene: &mut Scene, sensor: EntityId, interaction: Interaction) -> Result<(), SceneError> {
    let outcome = scene.with_behavior(sensor, INTERACTOR_SLOT, |behavior, cx| {
        match behavior.as_interactor_mut() {
            Some(interactor) => interactor.interact(interaction, cx),
            None => Ok(()),
        }
    });
    match outcome {
        Err(SceneError::FrameBreak) => Ok(()),
        other => other.map(|_| ()),
    }
}
