mod canvas;
mod present;
mod renderers;

pub use canvas::{Canvas, Color, PixelCanvas};
pub use present::Presenter;
pub use renderers::{
    fade_in, paused_overlay, AlphaRenderer, BlinkRenderer, ClipRenderer, FillRenderer,
    FlipRenderer, PauseBadge, FADE_CHILD,
};
