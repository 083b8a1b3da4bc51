use kurbo::{Affine, Rect, Vec2};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    u8::MAX
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// A 2D drawing surface with a save/restore state stack.
///
/// Transforms compose like a canvas context: each `translate`/`scale`
/// applies to coordinates given afterwards, in the current local space.
pub trait Canvas {
    /// Pixel size of the surface.
    fn size(&self) -> (u32, u32);
    fn resize(&mut self, width: u32, height: u32);

    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, by: Vec2);
    fn scale(&mut self, by: Vec2);
    fn transform(&self) -> Affine;

    fn global_alpha(&self) -> f64;
    fn set_global_alpha(&mut self, alpha: f64);

    /// Narrows drawing to `rect` (local space) until the matching `restore`.
    fn clip(&mut self, rect: Rect);

    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn clear(&mut self, color: Color);

    /// Raw RGBA8 rows when the surface is memory-backed.
    fn rgba(&self) -> Option<&[u8]> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct DrawState {
    transform: Affine,
    alpha: f64,
    clip: Option<Rect>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            alpha: 1.0,
            clip: None,
        }
    }
}

/// Memory-backed RGBA8 surface.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; pixel_len(width, height)],
            state: DrawState::default(),
            stack: Vec::new(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = (y as usize * self.width as usize + x as usize) * 4;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[index..index + 4]);
        Some(out)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn device_bounds(&self) -> Rect {
        let bounds = Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height));
        match self.state.clip {
            Some(clip) => bounds.intersect(clip),
            None => bounds,
        }
    }

    fn blend(&mut self, x: u32, y: u32, color: Color, alpha: f64) {
        let index = (y as usize * self.width as usize + x as usize) * 4;
        let Some(dst) = self.pixels.get_mut(index..index + 4) else {
            return;
        };
        let src = [color.r, color.g, color.b];
        for (channel, value) in dst.iter_mut().take(3).zip(src) {
            let mixed = f64::from(value) * alpha + f64::from(*channel) * (1.0 - alpha);
            *channel = mixed.round().clamp(0.0, 255.0) as u8;
        }
        let dst_alpha = f64::from(dst[3]) / 255.0;
        let out_alpha = alpha + dst_alpha * (1.0 - alpha);
        dst[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

fn pixel_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

impl Canvas for PixelCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; pixel_len(width, height)];
        self.state = DrawState::default();
        self.stack.clear();
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, by: Vec2) {
        self.state.transform = self.state.transform * Affine::translate(by);
    }

    fn scale(&mut self, by: Vec2) {
        self.state.transform = self.state.transform * Affine::scale_non_uniform(by.x, by.y);
    }

    fn transform(&self) -> Affine {
        self.state.transform
    }

    fn global_alpha(&self) -> f64 {
        self.state.alpha
    }

    fn set_global_alpha(&mut self, alpha: f64) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn clip(&mut self, rect: Rect) {
        let device = self.state.transform.transform_rect_bbox(rect);
        self.state.clip = Some(match self.state.clip {
            Some(clip) => clip.intersect(device),
            None => device,
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let alpha = f64::from(color.a) / 255.0 * self.state.alpha;
        if alpha <= 0.0 {
            return;
        }
        let device = self
            .state
            .transform
            .transform_rect_bbox(rect)
            .intersect(self.device_bounds());
        if device.width() <= 0.0 || device.height() <= 0.0 {
            return;
        }
        let x0 = device.x0.round().max(0.0) as u32;
        let y0 = device.y0.round().max(0.0) as u32;
        let x1 = (device.x1.round() as u32).min(self.width);
        let y1 = (device.y1.round() as u32).min(self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color, alpha);
            }
        }
    }

    fn clear(&mut self, color: Color) {
        let value = color.to_array();
        for chunk in self.pixels.chunks_exact_mut(4) {
            chunk.copy_from_slice(&value);
        }
    }

    fn rgba(&self) -> Option<&[u8]> {
        Some(&self.pixels)
    }
}
