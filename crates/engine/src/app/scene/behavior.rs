use std::any::Any;
use std::time::Duration;

use bitflags::bitflags;
use kurbo::{Point, Rect, Size, Vec2};

use super::{Cx, EntityId, Scene, SceneError};
use crate::app::rendering::Canvas;

pub const BODY_SLOT: &str = "body";
pub const RENDERER_SLOT: &str = "renderer";
pub const INTERACTOR_SLOT: &str = "interactor";

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A capability object living in one named slot of one entity.
///
/// Per-frame hooks only run while the behavior is attached. Well-known
/// capabilities are exposed through the `as_*` accessors so the scene can
/// reach them without knowing the concrete type.
pub trait Behavior: AsAny {
    /// Slot used when the behavior is installed without an explicit name.
    fn default_slot(&self) -> Option<&'static str> {
        None
    }

    fn attached(&mut self, _host: Option<EntityId>) {}

    fn behave(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn stay(&mut self, _cx: &mut Cx<'_>) -> Result<(), SceneError> {
        Ok(())
    }

    fn as_body(&self) -> Option<&dyn Body> {
        None
    }

    fn as_renderer(&mut self) -> Option<&mut dyn Renderer> {
        None
    }

    fn as_interactor(&self) -> Option<&dyn Interactor> {
        None
    }

    fn as_interactor_mut(&mut self) -> Option<&mut dyn Interactor> {
        None
    }
}

pub trait Body {
    /// Bounds of the host in its own local space.
    fn rect(&self, scene: &Scene, host: EntityId) -> Rect;
}

pub trait Renderer {
    fn paint(
        &mut self,
        canvas: &mut dyn Canvas,
        dest: Rect,
        time: Duration,
    ) -> Result<(), SceneError>;

    /// Size used for the destination when the host has no body.
    fn natural_size(&self) -> Size {
        Size::new(100.0, 100.0)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Senses: u8 {
        const TAP = 1 << 0;
        const DRAG = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interaction {
    /// Pointer went down on the tap sensor, in the sensor's local space.
    Touch(Point),
    Tap(Point),
    /// Incremental move, in the drag sensor's parent space.
    Drag(Vec2),
}

pub trait Interactor {
    fn sense(&self, point: Point) -> Senses;

    fn interact(&mut self, interaction: Interaction, cx: &mut Cx<'_>) -> Result<(), SceneError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectBody {
    pub rect: Rect,
}

impl RectBody {
    pub fn new(rect: Rect) -> Self {
        Self { rect }
    }

    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(Rect::new(0.0, 0.0, width, height))
    }
}

impl Body for RectBody {
    fn rect(&self, _scene: &Scene, _host: EntityId) -> Rect {
        self.rect
    }
}

impl Behavior for RectBody {
    fn default_slot(&self) -> Option<&'static str> {
        Some(BODY_SLOT)
    }

    fn as_body(&self) -> Option<&dyn Body> {
        Some(self)
    }
}

/// Body of the scene root: the visible area of the render target.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneBody;

impl Body for SceneBody {
    fn rect(&self, scene: &Scene, host: EntityId) -> Rect {
        match scene.target_size() {
            Some((width, height)) => {
                scene
                    .to_local(
                        host,
                        Rect::new(0.0, 0.0, f64::from(width), f64::from(height)),
                    )
                    .abs()
            }
            None => Rect::new(0.0, 0.0, 1.0, 1.0),
        }
    }
}

impl Behavior for SceneBody {
    fn default_slot(&self) -> Option<&'static str> {
        Some(BODY_SLOT)
    }

    fn as_body(&self) -> Option<&dyn Body> {
        Some(self)
    }
}
