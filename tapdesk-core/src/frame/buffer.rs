//! The remote desktop image held by the session.
//!
//! A [`FrameBuffer`] owns its dimensions together with its pixels, so a
//! reader holding one can never see a width that disagrees with the
//! storage behind it.

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of the frame buffer, chosen from the remote color depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel, used for color depths above 16 bpp.
    Argb8888,
    /// 2 bytes per pixel, used for 16 bpp and below.
    Rgb565,
}

impl PixelFormat {
    /// Format used to hold a remote desktop of `color_depth` bits per pixel.
    pub const fn for_color_depth(color_depth: u32) -> Self {
        if color_depth > 16 {
            PixelFormat::Argb8888
        } else {
            PixelFormat::Rgb565
        }
    }

    /// Bytes consumed by a single pixel in this format.
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Argb8888 => 4,
            PixelFormat::Rgb565 => 2,
        }
    }
}

// ── Region ───────────────────────────────────────────────────────

/// A rectangular area of the frame buffer, in remote pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole of a `width × height` buffer.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Intersect with a `width × height` buffer. Returns `None` when
    /// nothing of the region lies inside.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<Region> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Region::new(self.x, self.y, w, h))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────

/// Uncompressed remote desktop image.
///
/// `pixels` holds `height` tightly packed rows of `stride` bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    color_depth: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a zeroed buffer. Zero dimensions are raised to 1.
    pub fn new(width: u32, height: u32, color_depth: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let format = PixelFormat::for_color_depth(color_depth);
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            color_depth,
            format,
            pixels: vec![0u8; len],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Remote color depth in bits per pixel, as reported at resize.
    pub fn color_depth(&self) -> u32 {
        self.color_depth
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Row pitch in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable pixel storage, for the protocol engine to paint into.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Returns a row slice.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.pixels[start..start + self.stride()]
    }

    /// Returns the pixel bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let offset = y as usize * self.stride() + x as usize * bpp;
        &self.pixels[offset..offset + bpp]
    }

    /// Same dimensions and pixel layout as `other`.
    pub fn same_geometry(&self, other: &FrameBuffer) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }

    /// Overwrite `region` with `other`'s pixels. Returns `false` (and
    /// copies nothing) when the geometries differ.
    pub fn copy_region_from(&mut self, other: &FrameBuffer, region: Region) -> bool {
        if !self.same_geometry(other) {
            return false;
        }
        self.color_depth = other.color_depth;
        let Some(region) = region.clamp_to(self.width, self.height) else {
            return true;
        };
        let bpp = self.format.bytes_per_pixel();
        let stride = self.stride();
        let start = region.x as usize * bpp;
        let len = region.width as usize * bpp;
        for y in region.y..region.y + region.height {
            let at = y as usize * stride + start;
            self.pixels[at..at + len].copy_from_slice(&other.pixels[at..at + len]);
        }
        true
    }

    /// Fill `region` with a repeated pixel value. Bytes beyond the pixel
    /// size are ignored; missing bytes are zero.
    pub fn fill(&mut self, region: Region, pixel: &[u8]) {
        let Some(region) = region.clamp_to(self.width, self.height) else {
            return;
        };
        let bpp = self.format.bytes_per_pixel();
        let mut value = [0u8; 4];
        let n = pixel.len().min(bpp);
        value[..n].copy_from_slice(&pixel[..n]);
        let stride = self.stride();
        for y in region.y..region.y + region.height {
            let row = y as usize * stride;
            for x in region.x..region.x + region.width {
                let at = row + x as usize * bpp;
                self.pixels[at..at + bpp].copy_from_slice(&value[..bpp]);
            }
        }
    }
}
