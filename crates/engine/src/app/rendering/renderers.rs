use std::time::Duration;

use kurbo::{Point, Rect, Size, Vec2};

use super::{Canvas, Color};
use crate::app::scene::{
    Behavior, Body, Cx, EntityId, EntityLogic, Renderer, Scene, SceneError, BODY_SLOT,
    RENDERER_SLOT,
};

/// Child name the hand-off veil is installed under.
pub const FADE_CHILD: &str = "fade";

/// Fills the destination with a solid color.
#[derive(Debug, Clone, Copy)]
pub struct FillRenderer {
    pub color: Color,
}

impl FillRenderer {
    pub fn new(color: Color) -> Self {
        Self { color }
    }
}

impl Renderer for FillRenderer {
    fn paint(
        &mut self,
        canvas: &mut dyn Canvas,
        dest: Rect,
        _time: Duration,
    ) -> Result<(), SceneError> {
        canvas.fill_rect(dest, self.color);
        Ok(())
    }
}

/// Multiplies the global alpha around the inner renderer.
pub struct AlphaRenderer {
    inner: Box<dyn Renderer>,
    pub alpha: f64,
}

impl AlphaRenderer {
    pub fn new(inner: impl Renderer + 'static, alpha: f64) -> Self {
        Self {
            inner: Box::new(inner),
            alpha,
        }
    }
}

impl Renderer for AlphaRenderer {
    fn paint(
        &mut self,
        canvas: &mut dyn Canvas,
        dest: Rect,
        time: Duration,
    ) -> Result<(), SceneError> {
        if self.alpha == 0.0 {
            return Ok(());
        }
        let nature = canvas.global_alpha();
        canvas.set_global_alpha(nature * self.alpha);
        let result = self.inner.paint(canvas, dest, time);
        canvas.set_global_alpha(nature);
        result
    }

    fn natural_size(&self) -> Size {
        self.inner.natural_size()
    }
}

/// Mirrors the inner renderer horizontally and/or vertically.
pub struct FlipRenderer {
    inner: Box<dyn Renderer>,
    pub horizontal: bool,
    pub vertical: bool,
}

impl FlipRenderer {
    pub fn new(inner: impl Renderer + 'static, horizontal: bool, vertical: bool) -> Self {
        Self {
            inner: Box::new(inner),
            horizontal,
            vertical,
        }
    }
}

impl Renderer for FlipRenderer {
    fn paint(
        &mut self,
        canvas: &mut dyn Canvas,
        dest: Rect,
        time: Duration,
    ) -> Result<(), SceneError> {
        let mirror = Vec2::new(
            if self.horizontal { -1.0 } else { 1.0 },
            if self.vertical { -1.0 } else { 1.0 },
        );
        let flipped = Rect::new(
            dest.x0 * mirror.x,
            dest.y0 * mirror.y,
            dest.x1 * mirror.x,
            dest.y1 * mirror.y,
        )
        .abs();
        canvas.save();
        canvas.scale(mirror);
        let result = self.inner.paint(canvas, flipped, time);
        canvas.restore();
        result
    }

    fn natural_size(&self) -> Size {
        self.inner.natural_size()
    }
}

/// Clips the inner renderer to the destination rectangle.
pub struct ClipRenderer {
    inner: Box<dyn Renderer>,
}

impl ClipRenderer {
    pub fn new(inner: impl Renderer + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

impl Renderer for ClipRenderer {
    fn paint(
        &mut self,
        canvas: &mut dyn Canvas,
        dest: Rect,
        time: Duration,
    ) -> Result<(), SceneError> {
        canvas.save();
        canvas.clip(dest);
        let result = self.inner.paint(canvas, dest, time);
        canvas.restore();
        result
    }

    fn natural_size(&self) -> Size {
        self.inner.natural_size()
    }
}

/// Paints the inner renderer only during every other `period` of scene time.
pub struct BlinkRenderer {
    inner: Box<dyn Renderer>,
    period: Duration,
}

impl BlinkRenderer {
    pub fn new(inner: impl Renderer + 'static, period: Duration) -> Self {
        Self {
            inner: Box::new(inner),
            period,
        }
    }

    pub fn is_lit(&self, time: Duration) -> bool {
        let period = self.period.as_millis().max(1);
        (time.as_millis() / period) % 2 == 1
    }
}

impl Renderer for BlinkRenderer {
    fn paint(
        &mut self,
        canvas: &mut dyn Canvas,
        dest: Rect,
        time: Duration,
    ) -> Result<(), SceneError> {
        if !self.is_lit(time) {
            return Ok(());
        }
        self.inner.paint(canvas, dest, time)
    }

    fn natural_size(&self) -> Size {
        self.inner.natural_size()
    }
}

/// Two vertical bars centered on the destination.
#[derive(Debug, Clone, Copy)]
pub struct PauseBadge {
    pub color: Color,
    pub size: Size,
}

impl Default for PauseBadge {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            size: Size::new(24.0, 28.0),
        }
    }
}

impl Renderer for PauseBadge {
    fn paint(
        &mut self,
        canvas: &mut dyn Canvas,
        dest: Rect,
        _time: Duration,
    ) -> Result<(), SceneError> {
        let center = dest.center();
        let bar = Size::new(self.size.width / 3.0, self.size.height);
        let top = center.y - bar.height / 2.0;
        let left = Point::new(center.x - self.size.width / 2.0, top);
        let right = Point::new(center.x + self.size.width / 2.0 - bar.width, top);
        canvas.fill_rect(Rect::from_origin_size(left, bar), self.color);
        canvas.fill_rect(Rect::from_origin_size(right, bar), self.color);
        Ok(())
    }

    fn natural_size(&self) -> Size {
        self.size
    }
}

macro_rules! renderer_behavior {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Behavior for $ty {
                fn default_slot(&self) -> Option<&'static str> {
                    Some(RENDERER_SLOT)
                }

                fn as_renderer(&mut self) -> Option<&mut dyn Renderer> {
                    Some(self)
                }
            }
        )*
    };
}

renderer_behavior!(
    FillRenderer,
    AlphaRenderer,
    FlipRenderer,
    ClipRenderer,
    BlinkRenderer,
    PauseBadge,
);

/// Overlay shown while an engaged scene is system-paused: a dimming fill on
/// layer 0 and a blinking pause badge on layer 1, both covering the target.
pub fn paused_overlay() -> Result<Scene, SceneError> {
    let mut scene = Scene::new();
    let root = scene.root();
    scene.set_layer(root, Some(0))?;
    scene.set_behavior_now(
        root,
        Some(Box::new(FillRenderer::new(Color::rgba(0, 0, 0, 128)))),
        None,
    )?;

    let guide = scene.spawn();
    scene.set_layer(guide, Some(1))?;
    scene.set_behavior_now(guide, Some(Box::new(TargetBody)), None)?;
    scene.set_behavior_now(
        guide,
        Some(Box::new(BlinkRenderer::new(
            PauseBadge::default(),
            Duration::from_millis(500),
        ))),
        None,
    )?;
    scene.set_child_now(root, Some(guide), Some("guide"), "")?;
    Ok(scene)
}

/// Covers the target with `color` and fades it out over `duration` of scene
/// time, starting from the frame the veil is activated. The veil removes
/// itself once fully transparent.
pub fn fade_in(scene: &mut Scene, color: Color, duration: Duration) -> Result<EntityId, SceneError> {
    let veil = scene.spawn_with(Veil {
        color,
        duration,
        started: None,
        removal_requested: false,
    });
    scene.set_layer(veil, Some(i32::MAX))?;
    scene.set_behavior_now(veil, Some(Box::new(TargetBody)), None)?;
    let root = scene.root();
    scene.set_child_now(root, Some(veil), Some(FADE_CHILD), "")?;
    Ok(veil)
}

struct Veil {
    color: Color,
    duration: Duration,
    started: Option<Duration>,
    removal_requested: bool,
}

impl Veil {
    fn alpha(&self, time: Duration) -> f64 {
        let Some(started) = self.started else {
            return 1.0;
        };
        if self.duration.is_zero() {
            return 0.0;
        }
        let elapsed = time.saturating_sub(started).as_secs_f64();
        (1.0 - elapsed / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

impl EntityLogic for Veil {
    fn activate(&mut self, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        self.started = Some(cx.time());
        Ok(())
    }

    fn after(&mut self, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        if self.removal_requested || self.alpha(cx.time()) > 0.0 {
            return Ok(());
        }
        self.removal_requested = true;
        let id = cx.id();
        let scene = cx.scene_mut();
        match scene.parent_of(id) {
            Some(parent) => scene.request_remove_child(parent, FADE_CHILD),
            None => Ok(()),
        }
    }

    fn draw(&mut self, canvas: &mut dyn Canvas, cx: &mut Cx<'_>) -> Result<(), SceneError> {
        let alpha = self.alpha(cx.time());
        if alpha <= 0.0 {
            return Ok(());
        }
        let Some(dest) = cx.scene().body_rect(cx.id()) else {
            return Ok(());
        };
        let nature = canvas.global_alpha();
        canvas.set_global_alpha(nature * alpha);
        canvas.fill_rect(dest, self.color);
        canvas.set_global_alpha(nature);
        Ok(())
    }
}

/// Body that tracks the visible area of the scene's render target.
struct TargetBody;

impl Body for TargetBody {
    fn rect(&self, scene: &Scene, host: EntityId) -> Rect {
        scene
            .take_body(host, scene.root())
            .unwrap_or_else(|| Rect::new(0.0, 0.0, 1.0, 1.0))
    }
}

impl Behavior for TargetBody {
    fn default_slot(&self) -> Option<&'static str> {
        Some(BODY_SLOT)
    }

    fn as_body(&self) -> Option<&dyn Body> {
        Some(self)
    }
}
