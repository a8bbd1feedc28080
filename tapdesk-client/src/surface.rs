//! Software display surface: scales the remote frame into a local
//! 32-bit pixel buffer that a window toolkit can blit as-is.

use tapdesk_core::{DisplaySurface, FrameBuffer, PixelFormat, RenderGeometry};

const BYTES_PER_PIXEL: usize = 4;

/// Opaque black in the surface's BGRA byte order.
const BACKGROUND: [u8; 4] = [0, 0, 0, 0xff];

/// An in-memory BGRA surface.
#[derive(Debug, Clone)]
pub struct SoftwareSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl SoftwareSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let mut surface = Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };
        surface.resize(width, height);
        surface
    }

    /// Change the surface size; contents are reset to the background.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        self.pixels.clear();
        self.pixels.resize(len, 0);
        for px in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&BACKGROUND);
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the BGRA bytes at `(x, y)`, or `None` outside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let at = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[at..at + BYTES_PER_PIXEL]);
        Some(out)
    }
}

impl DisplaySurface for SoftwareSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn present(&mut self, frame: &FrameBuffer, geometry: &RenderGeometry) {
        let (sw, sh) = (self.width as usize, self.height as usize);
        if sw == 0 || sh == 0 || geometry.width <= 0.0 || geometry.height <= 0.0 {
            return;
        }
        let fw = frame.width() as f32;
        let fh = frame.height() as f32;
        let stride = sw * BYTES_PER_PIXEL;

        for (y, row) in self.pixels.chunks_exact_mut(stride).enumerate() {
            let ry = (y as f32 + 0.5 - geometry.top) / geometry.height;
            for (x, px) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
                let rx = (x as f32 + 0.5 - geometry.left) / geometry.width;
                if !(0.0..1.0).contains(&rx) || !(0.0..1.0).contains(&ry) {
                    px.copy_from_slice(&BACKGROUND);
                    continue;
                }
                // Nearest neighbour.
                let fx = ((rx * fw) as u32).min(frame.width() - 1);
                let fy = ((ry * fh) as u32).min(frame.height() - 1);
                px.copy_from_slice(&to_bgra(frame.format(), frame.pixel(fx, fy)));
            }
        }
    }
}

fn to_bgra(format: PixelFormat, src: &[u8]) -> [u8; 4] {
    match format {
        PixelFormat::Argb8888 => [src[0], src[1], src[2], 0xff],
        PixelFormat::Rgb565 => {
            let v = u16::from_le_bytes([src[0], src[1]]);
            let r = ((v >> 11) & 0x1f) as u8;
            let g = ((v >> 5) & 0x3f) as u8;
            let b = (v & 0x1f) as u8;
            [
                (b << 3) | (b >> 2),
                (g << 2) | (g >> 4),
                (r << 3) | (r >> 2),
                0xff,
            ]
        }
    }
}
