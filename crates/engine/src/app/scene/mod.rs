mod behavior;
mod coords;
mod error;
mod layers;
mod phases;
mod tree;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use kurbo::{Point, Size, Vec2};
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, info};

pub use behavior::{
    AsAny, Behavior, Body, Interaction, Interactor, RectBody, Renderer, SceneBody, Senses,
    BODY_SLOT, INTERACTOR_SLOT, RENDERER_SLOT,
};
pub use coords::Coord;
pub use error::{BudKind, SceneError};
pub use phases::{Cx, EntityLogic};
pub use tree::PendingEdit;

use crate::app::rendering::Canvas;

new_key_type! {
    pub struct EntityId;
}

/// Requests raised by hooks that only the owner of the scene can carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    Start,
    Stop,
    HandOff,
}

enum BudPayload {
    Child(Option<EntityId>),
    Behavior(Option<Box<dyn Behavior>>),
}

impl BudPayload {
    fn kind(&self) -> BudKind {
        match self {
            Self::Child(_) => BudKind::Child,
            Self::Behavior(_) => BudKind::Behavior,
        }
    }
}

struct Bud {
    name: Option<String>,
    prefix: String,
    payload: BudPayload,
    epoch: u64,
}

struct Node {
    position: Point,
    scale: Option<Vec2>,
    layer: Option<i32>,
    parent: Option<EntityId>,
    children: Vec<(String, EntityId)>,
    behaviors: Vec<(String, Option<Box<dyn Behavior>>)>,
    buds: Vec<Bud>,
    layer_cache: Option<BTreeSet<i32>>,
    activated: bool,
    logic: Option<Box<dyn EntityLogic>>,
}

impl Node {
    fn new(scale: Option<Vec2>) -> Self {
        Self {
            position: Point::ZERO,
            scale,
            layer: None,
            parent: None,
            children: Vec::new(),
            behaviors: Vec::new(),
            buds: Vec::new(),
            layer_cache: None,
            activated: false,
            logic: None,
        }
    }

    fn child(&self, name: &str) -> Option<EntityId> {
        self.children
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, id)| *id)
    }

    fn has_zero_scale(&self) -> bool {
        self.scale
            .map(|scale| scale.x == 0.0 || scale.y == 0.0)
            .unwrap_or(false)
    }
}

/// Root of a live entity tree.
///
/// Owns every entity (live or detached), the render target and the frame
/// clock values handed to hooks. Entities are addressed by [`EntityId`].
pub struct Scene {
    nodes: SlotMap<EntityId, Node>,
    root: EntityId,
    target: Option<Box<dyn Canvas>>,
    drawing_size: Option<(u32, u32)>,
    delta: Duration,
    time: Duration,
    epoch: u64,
    commands: Vec<SceneCommand>,
    display_size: Option<Size>,
    device_pixel_ratio: f64,
    warned_missing_target: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let mut root_node = Node::new(Some(Vec2::new(1.0, 1.0)));
        let root = nodes.insert_with_key(|key| {
            let mut body: Box<dyn Behavior> = Box::new(SceneBody);
            body.attached(Some(key));
            root_node
                .behaviors
                .push((BODY_SLOT.to_string(), Some(body)));
            root_node
        });

        Self {
            nodes,
            root,
            target: None,
            drawing_size: None,
            delta: Duration::ZERO,
            time: Duration::ZERO,
            epoch: 0,
            commands: Vec::new(),
            display_size: None,
            device_pixel_ratio: 1.0,
            warned_missing_target: false,
        }
    }

    pub fn with_target(target: Box<dyn Canvas>) -> Self {
        let mut scene = Self::new();
        scene.set_target(Some(target));
        scene
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Time between the two most recent frames.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Sum of every delta this scene has been advanced by.
    pub fn time(&self) -> Duration {
        self.time
    }

    pub fn target(&self) -> Option<&dyn Canvas> {
        self.target.as_deref()
    }

    pub fn target_mut(&mut self) -> Option<&mut (dyn Canvas + 'static)> {
        self.target.as_deref_mut()
    }

    /// Pixel size of the render target, also while a draw pass holds it.
    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.target
            .as_ref()
            .map(|target| target.size())
            .or(self.drawing_size)
    }

    pub fn set_target(&mut self, target: Option<Box<dyn Canvas>>) {
        self.warned_missing_target = false;
        self.target = target;
    }

    pub fn take_target(&mut self) -> Option<Box<dyn Canvas>> {
        self.target.take()
    }

    /// Size of the render target as displayed, in logical units.
    pub fn display_size(&self) -> Option<Size> {
        self.display_size
    }

    pub fn set_display_size(&mut self, size: Option<Size>) {
        self.display_size = size;
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f64) {
        if ratio.is_finite() && ratio > 0.0 {
            self.device_pixel_ratio = ratio;
        }
    }

    /// Render target pixels per displayed unit on each axis.
    pub fn canvas_ratio(&self) -> Vec2 {
        let (Some((width, height)), Some(display)) = (self.target_size(), self.display_size)
        else {
            return Vec2::new(1.0, 1.0);
        };
        let ratio = |pixels: u32, shown: f64| {
            if shown > 0.0 && pixels > 0 {
                f64::from(pixels) / shown
            } else {
                1.0
            }
        };
        Vec2::new(ratio(width, display.width), ratio(height, display.height))
    }

    pub(crate) fn push_command(&mut self, command: SceneCommand) {
        self.commands.push(command);
    }

    /// Drains start/stop requests raised by hooks. Hand-off requests stay queued.
    pub fn take_clock_commands(&mut self) -> Vec<SceneCommand> {
        let mut taken = Vec::new();
        self.commands.retain(|command| {
            if *command == SceneCommand::HandOff {
                true
            } else {
                taken.push(*command);
                false
            }
        });
        taken
    }

    pub fn take_hand_off_request(&mut self) -> bool {
        let before = self.commands.len();
        self.commands
            .retain(|command| *command != SceneCommand::HandOff);
        before != self.commands.len()
    }

    /// Writes the render target to a PNG file.
    pub fn snapshot_png(&self, path: &Path) -> Result<(), SceneError> {
        let target = self.target().ok_or(SceneError::SnapshotUnavailable)?;
        let (width, height) = target.size();
        let rgba = target.rgba().ok_or(SceneError::SnapshotUnavailable)?;
        image::save_buffer(path, rgba, width, height, image::ColorType::Rgba8)?;
        info!(path = %path.display(), width, height, "snapshot_written");
        Ok(())
    }

    fn node(&self, id: EntityId) -> Result<&Node, SceneError> {
        self.nodes.get(id).ok_or(SceneError::UnknownEntity(id))
    }

    fn node_mut(&mut self, id: EntityId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::UnknownEntity(id))
    }

    fn note_frame_break(&self) {
        debug!(time_ms = self.time.as_millis() as u64, "frame_break");
    }
}

#[cfg(test)]
mod tests;
