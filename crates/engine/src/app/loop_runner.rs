use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use super::input::{
    host_action_for, logical_point, logical_size, HostAction, PointerEvent, PointerTracker,
};
use super::metrics::MetricsAccumulator;
use super::rendering::{fade_in, Color, PixelCanvas, Presenter};
use super::scene::{Scene, SceneError};
use super::stage::{
    hand_off, EngageScene, Engaged, FrameClock, InteractScene, ResponsiveScene, TimeScene,
    DEFAULT_INTERNAL_PIXEL_RATIO, DEFAULT_MAX_RATE, DEFAULT_MIN_RATE,
};
use super::MetricsHandle;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub window_title: String,
    /// Logical units.
    pub window_width: u32,
    pub window_height: u32,
    pub max_rate: u32,
    pub min_rate: u32,
    pub internal_pixel_ratio: f64,
    pub metrics_log_interval_ms: u64,
    /// Fade from black over the next scene after a hand-off; 0 disables it.
    pub hand_off_fade_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Glass".to_string(),
            window_width: 960,
            window_height: 540,
            max_rate: DEFAULT_MAX_RATE,
            min_rate: DEFAULT_MIN_RATE,
            internal_pixel_ratio: DEFAULT_INTERNAL_PIXEL_RATIO,
            metrics_log_interval_ms: 1000,
            hand_off_fade_ms: 250,
        }
    }
}

impl LoopConfig {
    pub fn frame_clock(&self) -> FrameClock {
        FrameClock::new(self.max_rate, self.min_rate)
    }

    pub fn hand_off_fade(&self) -> Duration {
        Duration::from_millis(self.hand_off_fade_ms)
    }

    pub fn metrics_log_interval(&self) -> Duration {
        normalize_non_zero_duration(
            Duration::from_millis(self.metrics_log_interval_ms),
            Duration::from_secs(1),
        )
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("failed to build scene: {0}")]
    BuildScene(#[source] SceneError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// The full wrapper chain the host runner drives.
pub type StandardStage = ResponsiveScene<EngageScene<InteractScene<TimeScene>>>;

/// Wraps `scene` in the standard chain configured from `config`.
pub fn standard_stage(scene: Scene, config: &LoopConfig) -> Result<StandardStage, SceneError> {
    let timed = TimeScene::with_clock(scene, config.frame_clock());
    let mut stage = ResponsiveScene::new(EngageScene::new(InteractScene::new(timed))?);
    stage.set_internal_pixel_ratio(config.internal_pixel_ratio);
    Ok(stage)
}

/// Opens a window and drives the stage built by `factory` until the window
/// closes. Hand-off requests raised by hooks build the next stage from the
/// same factory.
pub fn run_app<S, F>(config: LoopConfig, factory: F) -> Result<(), AppError>
where
    S: Engaged + 'static,
    F: FnMut(&LoopConfig) -> Result<S, SceneError> + 'static,
{
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, factory, metrics_handle)
}

pub fn run_app_with_metrics<S, F>(
    config: LoopConfig,
    mut factory: F,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError>
where
    S: Engaged + 'static,
    F: FnMut(&LoopConfig) -> Result<S, SceneError> + 'static,
{
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut presenter = Presenter::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;

    let mut scale_factor = window.scale_factor();
    let mut stage = factory(&config).map_err(AppError::BuildScene)?;
    {
        let scene = stage.scene_mut();
        scene.set_display_size(Some(logical_size(window.inner_size(), scale_factor)));
        scene.set_device_pixel_ratio(scale_factor);
        scene.set_target(Some(Box::new(PixelCanvas::new(1, 1))));
    }

    let metrics_log_interval = config.metrics_log_interval();
    info!(
        max_rate = stage.clock().max_rate(),
        min_rate = stage.clock().min_rate(),
        internal_pixel_ratio = config.internal_pixel_ratio,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        scale_factor,
        "loop_config"
    );

    let started = Instant::now();
    let mut pointer = PointerTracker::default();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    stage.start(Duration::ZERO);

    event_loop
        .run(move |event, window_target| {
            let now = started.elapsed();
            match event {
                Event::WindowEvent { window_id, event } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested => {
                            info!(reason = "window_close", "shutdown_requested");
                            window_target.exit();
                        }
                        WindowEvent::Resized(new_size) => {
                            stage
                                .scene_mut()
                                .set_display_size(Some(logical_size(new_size, scale_factor)));
                            if let Err(error) =
                                presenter.resize_surface(new_size.width, new_size.height)
                            {
                                warn!(error = %error, "renderer_resize_failed");
                                window_target.exit();
                            }
                            window.request_redraw();
                        }
                        WindowEvent::ScaleFactorChanged {
                            scale_factor: next, ..
                        } => {
                            scale_factor = next;
                            let size = window.inner_size();
                            let scene = stage.scene_mut();
                            scene.set_device_pixel_ratio(scale_factor);
                            scene.set_display_size(Some(logical_size(size, scale_factor)));
                            if let Err(error) = presenter.resize_surface(size.width, size.height) {
                                warn!(error = %error, "renderer_resize_failed");
                                window_target.exit();
                            }
                            window.request_redraw();
                        }
                        WindowEvent::Occluded(occluded) => {
                            stage.visibility_changed(!occluded, now);
                            debug!(occluded, play_state = ?stage.play_state(), "visibility_changed");
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            let at = logical_point(position, scale_factor);
                            if let Some(event) = pointer.cursor_moved(at) {
                                if let Err(error) = dispatch_pointer(&mut stage, event, now) {
                                    warn!(error = %error, "pointer_dispatch_failed");
                                    window_target.exit();
                                }
                            }
                        }
                        WindowEvent::CursorLeft { .. } => pointer.cursor_left(),
                        WindowEvent::MouseInput { state, button, .. } => {
                            if let Some(event) = pointer.mouse_input(button, state) {
                                if let Err(error) = dispatch_pointer(&mut stage, event, now) {
                                    warn!(error = %error, "pointer_dispatch_failed");
                                    window_target.exit();
                                }
                            }
                        }
                        WindowEvent::Touch(touch) => {
                            let at = logical_point(touch.location, scale_factor);
                            if let Some(event) = pointer.touch(touch.id, touch.phase, at) {
                                if let Err(error) = dispatch_pointer(&mut stage, event, now) {
                                    warn!(error = %error, "pointer_dispatch_failed");
                                    window_target.exit();
                                }
                            }
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state != ElementState::Pressed || event.repeat {
                                return;
                            }
                            match host_action_for(event.physical_key) {
                                Some(HostAction::Quit) => {
                                    info!(reason = "escape_key", "shutdown_requested");
                                    window_target.exit();
                                }
                                Some(HostAction::ToggleDebugStop) => {
                                    let clock = stage.clock_mut();
                                    let debug_stop = !clock.debug_stop();
                                    clock.set_debug_stop(debug_stop);
                                    info!(debug_stop, "debug_stop_toggled");
                                }
                                Some(HostAction::Snapshot) => {
                                    let path = snapshot_path(now);
                                    if let Err(error) = stage.scene().snapshot_png(&path) {
                                        warn!(error = %error, path = %path.display(), "snapshot_failed");
                                    }
                                }
                                None => {}
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            // A stopped stage still repaints on demand, without advancing.
                            let polled = if stage.is_running() {
                                stage.poll(now)
                            } else {
                                stage.tick().map(|()| None)
                            };
                            let tick = match polled {
                                Ok(tick) => tick,
                                Err(error) => {
                                    warn!(error = %error, "scene_frame_failed");
                                    window_target.exit();
                                    return;
                                }
                            };
                            metrics_accumulator.record_poll(tick);

                            if stage.scene_mut().take_hand_off_request() {
                                match factory(&config) {
                                    Ok(mut next) => {
                                        hand_off(&mut stage, &mut next, now);
                                        let fade = config.hand_off_fade();
                                        if !fade.is_zero() {
                                            if let Err(error) =
                                                fade_in(next.scene_mut(), Color::BLACK, fade)
                                            {
                                                warn!(error = %error, "hand_off_fade_failed");
                                            }
                                        }
                                        stage = next;
                                    }
                                    Err(error) => {
                                        warn!(error = %error, "hand_off_failed");
                                        window_target.exit();
                                        return;
                                    }
                                }
                            }

                            if let Some(target) = stage.scene().target() {
                                if let Err(error) = presenter.present(target) {
                                    warn!(error = %error, "renderer_draw_failed");
                                    window_target.exit();
                                }
                            }

                            if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now())
                            {
                                metrics_handle.publish(snapshot);
                                info!(
                                    fps = snapshot.fps,
                                    polls_per_second = snapshot.polls_per_second,
                                    frame_time_ms = snapshot.frame_time_ms,
                                    clamped_frames = snapshot.clamped_frames,
                                    entity_count = stage.scene().entity_count(),
                                    "loop_metrics"
                                );
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    // Redraws are only requested while the clock is armed.
                    if stage.is_running() {
                        window_target.set_control_flow(ControlFlow::Poll);
                        window.request_redraw();
                    } else {
                        window_target.set_control_flow(ControlFlow::Wait);
                    }
                }
                Event::LoopExiting => {
                    let _ = stage.dispose();
                    info!("shutdown");
                }
                _ => {}
            }
        })
        .map_err(AppError::EventLoopRun)
}

fn dispatch_pointer<S: Engaged + ?Sized>(
    stage: &mut S,
    event: PointerEvent,
    now: Duration,
) -> Result<(), SceneError> {
    let response = match event {
        PointerEvent::Down(at) => stage.pointer_down(at, now)?,
        PointerEvent::Move(at) => stage.pointer_move(at)?,
        PointerEvent::Up => stage.pointer_up(now)?,
    };
    stage.run_commands(now);
    if response.suppress_default {
        debug!(?event, "pointer_claimed");
    }
    Ok(())
}

fn snapshot_path(now: Duration) -> PathBuf {
    PathBuf::from(format!("glass-snapshot-{}.png", now.as_millis()))
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
