//! Retained-mode entity tree with behaviors, driven by a 2D frame loop.

pub mod app;

pub use app::{
    fade_in, hand_off, paused_overlay, run_app, run_app_with_metrics, standard_stage,
    AlphaRenderer, AppError, AsAny, AudioSink, Behavior, BlinkRenderer, Body, BudKind, Canvas,
    ClipRenderer, Color, Coord, Cx, EngageScene, Engaged, EntityId, EntityLogic, FillRenderer,
    FlipRenderer, FrameClock, FrameTick, InteractScene, Interaction, Interactive, Interactor,
    LoopConfig, LoopMetricsSnapshot, MetricsHandle, PauseBadge, PendingEdit, PixelCanvas,
    PlayState, PointerResponse, Presenter, RectBody, Renderer, ResponsiveScene, Scene, SceneBody,
    SceneCommand, SceneError, Senses, SilentAudio, Stage, StandardStage, TimeScene, Timed,
    BODY_SLOT, DEFAULT_INTERNAL_PIXEL_RATIO, DEFAULT_MAX_RATE, DEFAULT_MIN_RATE, DRAG_THRESHOLD,
    FADE_CHILD, INTERACTOR_SLOT, RENDERER_SLOT, TAP_WINDOW,
};
