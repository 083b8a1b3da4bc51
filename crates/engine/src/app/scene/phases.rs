use std::time::Duration;

use kurbo::{Point, Rect};
use tracing::{debug, warn};

use super::{Behavior, EntityId, Scene, SceneCommand, SceneError, RENDERER_SLOT};
use crate::app::rendering::Canvas;

/// Per-entity hooks driven by the three frame phases.
///
/// Every hook defaults to a no-op except `draw`, which paints through the
/// entity's "renderer" behavior.
pub trait EntityLogic: 'static {
    /// Runs once on the first update after the entity is inserted.
    fn activate(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn update(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn after(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        cx.render(canvas)
    }
}

/// Handle given to hooks: the scene plus the entity being visited.
pub struct Cx<'a> {
    scene: &'a mut Scene,
    id: EntityId,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(scene: &'a mut Scene, id: EntityId) -> Self {
        Self { scene, id }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn scene(&self) -> &Scene {
        self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        self.scene
    }

    pub fn delta(&self) -> Duration {
        self.scene.delta
    }

    pub fn time(&self) -> Duration {
        self.scene.time
    }

    /// Paints the visited entity through its "renderer" behavior.
    pub fn render(&mut self, canvas: &mut dyn Canvas) -> Result<(), SceneError> {
        self.scene.render_with_renderer(self.id, canvas)
    }

    /// Asks the owner of the scene to start its clock after this frame.
    pub fn start(&mut self) {
        self.scene.push_command(SceneCommand::Start);
    }

    /// Asks the owner to stop the clock. With `immediate` the rest of the
    /// frame is cut short: propagate the returned error with `?`.
    pub fn stop(&mut self, immediate: bool) -> Result<(), SceneError> {
        self.scene.push_command(SceneCommand::Stop);
        if immediate {
            Err(SceneError::FrameBreak)
        } else {
            Ok(())
        }
    }

    /// Asks the owner to hand the render target to the next scene. Return
    /// the result from the hook; the frame ends there.
    pub fn hand_off(&mut self) -> SceneError {
        self.scene.push_command(SceneCommand::HandOff);
        SceneError::FrameBreak
    }
}

impl Scene {
    /// Advances the tree by `delta`: update, after, then one draw pass per layer.
    ///
    /// A frame break raised by a hook ends the frame early and is not reported.
    pub fn frame(&mut self, delta: Duration) -> Result<(), SceneError> {
        self.delta = delta;
        self.time = self.time.saturating_add(delta);
        self.epoch = self.epoch.wrapping_add(1);

        match self.run_phases() {
            Err(SceneError::FrameBreak) => {
                self.note_frame_break();
                Ok(())
            }
            result => result,
        }
    }

    fn run_phases(&mut self) -> Result<(), SceneError> {
        let root = self.root;
        self.update_tree(root)?;
        self.after_tree(root)?;
        self.draw_all_layers()
    }

    fn update_tree(&mut self, id: EntityId) -> Result<(), SceneError> {
        self.flush_buds(id);

        let first_visit = match self.nodes.get_mut(id) {
            Some(node) => !std::mem::replace(&mut node.activated, true),
            None => return Ok(()),
        };
        if first_visit {
            self.with_logic(id, |logic, cx| logic.activate(cx))?;
        }
        self.with_logic(id, |logic, cx| logic.update(cx))?;
        self.with_behaviors(id, |behavior, cx| behavior.behave(cx))?;

        for child in self.children_of(id) {
            if self.parent_of(child) == Some(id) {
                self.update_tree(child)?;
            }
        }
        Ok(())
    }

    fn after_tree(&mut self, id: EntityId) -> Result<(), SceneError> {
        if !self.nodes.contains_key(id) {
            return Ok(());
        }
        self.with_logic(id, |logic, cx| logic.after(cx))?;
        self.with_behaviors(id, |behavior, cx| behavior.stay(cx))?;

        for child in self.children_of(id) {
            if self.parent_of(child) == Some(id) {
                self.after_tree(child)?;
            }
        }
        Ok(())
    }

    fn draw_all_layers(&mut self) -> Result<(), SceneError> {
        let Some(mut target) = self.target.take() else {
            if !self.warned_missing_target {
                self.warned_missing_target = true;
                warn!(time_ms = self.time.as_millis() as u64, "render_target_missing");
            }
            return Ok(());
        };

        self.drawing_size = Some(target.size());
        let root = self.root;
        let mut result = Ok(());
        for layer in self.layers() {
            result = self.draw_tree(root, layer, target.as_mut());
            if result.is_err() {
                break;
            }
        }

        self.drawing_size = None;
        if self.target.is_none() {
            self.target = Some(target);
        } else {
            debug!("render_target_replaced_during_draw");
        }
        result
    }

    fn draw_tree(
        &mut self,
        id: EntityId,
        layer: i32,
        canvas: &mut dyn Canvas,
    ) -> Result<(), SceneError> {
        if !self.subtree_has_layer(id, layer) {
            return Ok(());
        }
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        if node.has_zero_scale() {
            return Ok(());
        }
        let position = node.position;
        let scale = node.scale;
        let draws_here = node.layer == Some(layer);

        canvas.save();
        canvas.translate(position.to_vec2());
        if let Some(scale) = scale {
            canvas.scale(scale);
        }
        let result = self.draw_family(id, layer, draws_here, canvas);
        canvas.restore();
        result
    }

    fn draw_family(
        &mut self,
        id: EntityId,
        layer: i32,
        draws_here: bool,
        canvas: &mut dyn Canvas,
    ) -> Result<(), SceneError> {
        if draws_here {
            let has_logic = self
                .nodes
                .get(id)
                .map(|node| node.logic.is_some())
                .unwrap_or(false);
            if has_logic {
                self.with_logic(id, |logic, cx| logic.draw(canvas, cx))?;
            } else {
                self.render_with_renderer(id, canvas)?;
            }
        }
        for child in self.children_of(id) {
            if self.parent_of(child) == Some(id) {
                self.draw_tree(child, layer, canvas)?;
            }
        }
        Ok(())
    }

    pub(super) fn render_with_renderer(
        &mut self,
        id: EntityId,
        canvas: &mut dyn Canvas,
    ) -> Result<(), SceneError> {
        let time = self.time;
        let body = self.body_rect(id);
        let Some(renderer) = self
            .behavior_mut(id, RENDERER_SLOT)
            .and_then(|behavior| behavior.as_renderer())
        else {
            return Ok(());
        };
        let dest =
            body.unwrap_or_else(|| Rect::from_origin_size(Point::ZERO, renderer.natural_size()));
        renderer.paint(canvas, dest, time)
    }

    fn with_logic(
        &mut self,
        id: EntityId,
        call: impl FnOnce(&mut dyn EntityLogic, &mut Cx<'_>) -> Result<(), SceneError>,
    ) -> Result<(), SceneError> {
        let Some(mut logic) = self.nodes.get_mut(id).and_then(|node| node.logic.take()) else {
            return Ok(());
        };
        let result = call(logic.as_mut(), &mut Cx::new(self, id));
        if let Some(node) = self.nodes.get_mut(id) {
            if node.logic.is_none() {
                node.logic = Some(logic);
            }
        }
        result
    }

    fn with_behaviors(
        &mut self,
        id: EntityId,
        mut call: impl FnMut(&mut dyn Behavior, &mut Cx<'_>) -> Result<(), SceneError>,
    ) -> Result<(), SceneError> {
        for slot in self.behavior_slots(id) {
            self.with_behavior(id, &slot, &mut call)?;
        }
        Ok(())
    }

    /// Runs `call` on the behavior in `slot` with the behavior lifted out of
    /// the tree so the hook can borrow the scene mutably.
    pub(crate) fn with_behavior<R>(
        &mut self,
        id: EntityId,
        slot: &str,
        call: impl FnOnce(&mut dyn Behavior, &mut Cx<'_>) -> Result<R, SceneError>,
    ) -> Result<Option<R>, SceneError> {
        let Some(mut behavior) = self.lift_behavior(id, slot) else {
            return Ok(None);
        };
        let result = call(behavior.as_mut(), &mut Cx::new(self, id));
        self.return_behavior(id, slot, behavior);
        result.map(Some)
    }

    fn lift_behavior(&mut self, id: EntityId, slot: &str) -> Option<Box<dyn Behavior>> {
        self.nodes
            .get_mut(id)?
            .behaviors
            .iter_mut()
            .find(|(key, _)| key == slot)
            .and_then(|(_, behavior)| behavior.take())
    }

    fn return_behavior(&mut self, id: EntityId, slot: &str, mut behavior: Box<dyn Behavior>) {
        let vacant = self
            .nodes
            .get_mut(id)
            .and_then(|node| node.behaviors.iter_mut().find(|(key, _)| key == slot))
            .filter(|entry| entry.1.is_none());
        match vacant {
            Some((_, occupant)) => *occupant = Some(behavior),
            None => {
                debug!(entity = ?id, slot, "behavior_replaced_while_running");
                behavior.attached(None);
            }
        }
    }
}
