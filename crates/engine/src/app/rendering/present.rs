use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use tracing::debug;
use winit::window::Window;

use super::Canvas;

/// Copies a memory-backed render target to the window surface.
///
/// The pixel buffer follows the target size; the surface follows the
/// window. Either change rebuilds the `Pixels` instance.
pub struct Presenter {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    surface: (u32, u32),
    buffer: (u32, u32),
}

impl Presenter {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let surface = (size.width.max(1), size.height.max(1));
        let pixels = Self::build_pixels(Arc::clone(&window), surface, surface)?;
        Ok(Self {
            window,
            pixels,
            surface,
            buffer: surface,
        })
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 || (width, height) == self.surface {
            return Ok(());
        }
        self.surface = (width, height);
        self.pixels = Self::build_pixels(Arc::clone(&self.window), self.surface, self.buffer)?;
        Ok(())
    }

    pub fn present(&mut self, target: &dyn Canvas) -> Result<(), Error> {
        let Some(rgba) = target.rgba() else {
            return Ok(());
        };
        let size = target.size();
        if size.0 == 0 || size.1 == 0 {
            return Ok(());
        }
        if size != self.buffer {
            self.buffer = size;
            self.pixels = Self::build_pixels(Arc::clone(&self.window), self.surface, self.buffer)?;
            debug!(width = size.0, height = size.1, "present_buffer_resized");
        }

        let frame = self.pixels.frame_mut();
        if frame.len() == rgba.len() {
            frame.copy_from_slice(rgba);
        }
        self.pixels.render()
    }

    fn build_pixels(
        window: Arc<Window>,
        surface: (u32, u32),
        buffer: (u32, u32),
    ) -> Result<Pixels<'static>, Error> {
        let texture = SurfaceTexture::new(surface.0, surface.1, window);
        Pixels::new(buffer.0, buffer.1, texture)
    }
}
