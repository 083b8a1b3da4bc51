mod audio;
mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;
mod stage;

pub use audio::{AudioSink, SilentAudio};
pub use loop_runner::{
    run_app, run_app_with_metrics, standard_stage, AppError, LoopConfig, StandardStage,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{
    fade_in, paused_overlay, AlphaRenderer, BlinkRenderer, Canvas, ClipRenderer, Color,
    FillRenderer, FlipRenderer, PauseBadge, PixelCanvas, Presenter, FADE_CHILD,
};
pub use scene::{
    AsAny, Behavior, Body, BudKind, Coord, Cx, EntityId, EntityLogic, Interaction, Interactor,
    PendingEdit, RectBody, Renderer, Scene, SceneBody, SceneCommand, SceneError, Senses,
    BODY_SLOT, INTERACTOR_SLOT, RENDERER_SLOT,
};
pub use stage::{
    hand_off, EngageScene, Engaged, FrameClock, FrameTick, InteractScene, Interactive, PlayState,
    PointerResponse, ResponsiveScene, Stage, TimeScene, Timed, DEFAULT_INTERNAL_PIXEL_RATIO,
    DEFAULT_MAX_RATE, DEFAULT_MIN_RATE, DRAG_THRESHOLD, TAP_WINDOW,
};
