use std::time::Duration;

use kurbo::{Point, Size, Vec2};
use tracing::{debug, warn};

use super::{Engaged, FrameClock, Interactive, PlayState, PointerResponse, Stage, Timed};
use crate::app::rendering::Canvas;
use crate::app::scene::{Scene, SceneError};

/// Pixel density scene content is authored for.
pub const DEFAULT_INTERNAL_PIXEL_RATIO: f64 = 2.0;

/// Keeps the render target sized to the displayed area and scales the root
/// so content authored at the internal pixel ratio fills it.
pub struct ResponsiveScene<S> {
    inner: S,
    internal_pixel_ratio: f64,
    followed: Option<(Size, f64)>,
}

impl<S: Engaged> ResponsiveScene<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            internal_pixel_ratio: DEFAULT_INTERNAL_PIXEL_RATIO,
            followed: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn internal_pixel_ratio(&self) -> f64 {
        self.internal_pixel_ratio
    }

    pub fn set_internal_pixel_ratio(&mut self, ratio: f64) {
        if !ratio.is_finite() || ratio <= 0.0 {
            warn!(ratio, "internal pixel ratio must be positive; keeping current");
            return;
        }
        self.internal_pixel_ratio = ratio;
        self.followed = None;
    }

    /// Target pixels per display unit: the device ratio, capped at the
    /// internal ratio.
    pub fn canvas_pixel_ratio(&self) -> f64 {
        self.internal_pixel_ratio
            .min(self.inner.scene().device_pixel_ratio())
    }

    /// Resizes the target and rescales the root when the display size or
    /// device ratio changed since the last call.
    pub fn follow_size(&mut self) {
        let scene = self.inner.scene();
        let Some(display) = scene.display_size() else {
            return;
        };
        let key = (display, scene.device_pixel_ratio());
        if self.followed == Some(key) {
            return;
        }

        let ratio = self.canvas_pixel_ratio();
        let width = (display.width * ratio).round().max(1.0) as u32;
        let height = (display.height * ratio).round().max(1.0) as u32;
        let root_scale = ratio / self.internal_pixel_ratio;

        let scene = self.inner.scene_mut();
        let Some(target) = scene.target_mut() else {
            return;
        };
        target.resize(width, height);
        let root = scene.root();
        if let Err(error) = scene.set_scale(root, Vec2::new(root_scale, root_scale)) {
            warn!(error = %error, "root_rescale_failed");
        }
        self.followed = Some(key);
        debug!(
            width,
            height,
            canvas_pixel_ratio = ratio,
            root_scale,
            "target_resized"
        );
    }
}

impl<S: Engaged> Stage for ResponsiveScene<S> {
    fn scene(&self) -> &Scene {
        self.inner.scene()
    }

    fn scene_mut(&mut self) -> &mut Scene {
        self.inner.scene_mut()
    }

    fn frame(&mut self, delta: Duration) -> Result<(), SceneError> {
        self.follow_size();
        self.inner.frame(delta)
    }

    fn dispose(&mut self) -> Option<Box<dyn Canvas>> {
        self.followed = None;
        self.inner.dispose()
    }
}

impl<S: Engaged> Timed for ResponsiveScene<S> {
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
        self.inner.stop();
    }

    fn is_running(&self) -> bool {
        self.inner.is_running()
    }
}

impl<S: Engaged> Interactive for ResponsiveScene<S> {
    fn pointer_down(&mut self, at: Point, now: Duration) -> Result<PointerResponse, SceneError> {
        self.inner.pointer_down(at, now)
    }

    fn pointer_move(&mut self, at: Point) -> Result<PointerResponse, SceneError> {
        self.inner.pointer_move(at)
    }

    fn pointer_up(&mut self, now: Duration) -> Result<PointerResponse, SceneError> {
        self.inner.pointer_up(now)
    }
}

impl<S: Engaged> Engaged for ResponsiveScene<S> {
    fn play_state(&self) -> PlayState {
        self.inner.play_state()
    }

    fn visibility_changed(&mut self, visible: bool, now: Duration) {
        self.inner.visibility_changed(visible, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::rendering::PixelCanvas;
    use crate::app::stage::{EngageScene, InteractScene, TimeScene};

    type Full = ResponsiveScene<EngageScene<InteractScene<TimeScene>>>;

    fn full() -> Full {
        let scene = Scene::with_target(Box::new(PixelCanvas::new(1, 1)));
        ResponsiveScene::new(
            EngageScene::new(InteractScene::new(TimeScene::new(scene))).expect("overlay"),
        )
    }

    #[test]
    fn frame_sizes_target_to_display_times_capped_ratio() {
        let mut stage = full();
        let scene = stage.scene_mut();
        scene.set_display_size(Some(Size::new(320.0, 200.0)));
        scene.set_device_pixel_ratio(3.0);

        stage.frame(Duration::from_millis(16)).expect("frame");
        let scene = stage.scene();
        assert_eq!(scene.target_size(), Some((640, 400)));
        assert_eq!(scene.scale(scene.root()), Some(Vec2::new(1.0, 1.0)));
        assert_eq!(scene.canvas_ratio(), Vec2::new(2.0, 2.0));
    }

    #[test]
    fn low_density_display_scales_the_root_down() {
        let mut stage = full();
        stage
            .scene_mut()
            .set_display_size(Some(Size::new(100.0, 50.0)));

        stage.frame(Duration::ZERO).expect("frame");
        let scene = stage.scene();
        assert_eq!(scene.target_size(), Some((100, 50)));
        assert_eq!(scene.scale(scene.root()), Some(Vec2::new(0.5, 0.5)));
    }

    #[test]
    fn changing_the_internal_ratio_refollows_on_next_frame() {
        let mut stage = full();
        let scene = stage.scene_mut();
        scene.set_display_size(Some(Size::new(100.0, 100.0)));
        scene.set_device_pixel_ratio(2.0);
        stage.frame(Duration::ZERO).expect("frame");

        stage.set_internal_pixel_ratio(4.0);
        stage.set_internal_pixel_ratio(-1.0);
        stage.frame(Duration::ZERO).expect("frame");

        let scene = stage.scene();
        assert_eq!(stage.internal_pixel_ratio(), 4.0);
        assert_eq!(scene.target_size(), Some((200, 200)));
        assert_eq!(scene.scale(scene.root()), Some(Vec2::new(0.5, 0.5)));
    }

    #[test]
    fn unknown_display_size_leaves_the_target_alone() {
        let mut stage = full();
        stage.frame(Duration::ZERO).expect("frame");
        assert_eq!(stage.scene().target_size(), Some((1, 1)));
    }
}
