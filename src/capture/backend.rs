//! Capture target abstraction.
//!
//! The recorder never talks to a browser directly. Anything that can render
//! itself to PNG implements [`CaptureTarget`]:
//! - browser driver / page handles provided by the embedding test framework
//! - element handles (`is_page() == false`), which are never remembered for
//!   teardown screenshots
//! - `MockFramebuffer` for tests and demos

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{ImageBuffer, RgbImage};
use std::io::Cursor;

use super::types::{Capture, CaptureError, CaptureResult};
use crate::mime::Mime;

/// Trait for screenshot targets
///
/// Calls are synchronous and block until the underlying driver returns.
pub trait CaptureTarget {
    /// Take a PNG screenshot. `full_page` asks for the whole scrollable page
    /// instead of the visible viewport; targets without that notion ignore it.
    fn screenshot(&self, full_page: bool) -> CaptureResult<Vec<u8>>;

    /// HTML source of the page, if the target has one
    fn page_source(&self) -> CaptureResult<Option<String>> {
        Ok(None)
    }

    /// Get the source type identifier (e.g., "webdriver", "page", "mock")
    fn source_type(&self) -> &str;

    /// Whether the target is a whole page (as opposed to an element)
    fn is_page(&self) -> bool {
        true
    }
}

/// Capture a screenshot and, if asked for, the page source of `target`
pub fn capture_target(
    target: &dyn CaptureTarget,
    full_page: bool,
    with_source: bool,
) -> CaptureResult<Capture> {
    let image = target.screenshot(full_page)?;
    if image.is_empty() {
        return Err(CaptureError::Screenshot(format!(
            "{} returned an empty image",
            target.source_type()
        )));
    }
    let page_source = if with_source && target.is_page() {
        target.page_source()?
    } else {
        None
    };
    Ok(Capture {
        image,
        mime: Mime::Png,
        page_source,
    })
}

/// A virtual framebuffer for testing and programmatic drawing
///
/// Provides a full drawing API for creating test fixtures:
/// - `fill()` - Fill entire buffer with a color
/// - `draw_rect()` - Draw a filled rectangle
/// - `draw_text()` - Draw text using font8x8 glyphs
/// - `get_pixel()` / `set_pixel()` - Direct pixel access
///
/// With a viewport set, non-full-page screenshots are cropped to it.
#[derive(Debug, Clone)]
pub struct MockFramebuffer {
    width: u32,
    height: u32,
    /// RGB pixel buffer (row-major, 3 bytes per pixel)
    buffer: Vec<u8>,
    viewport_height: Option<u32>,
    page_source: Option<String>,
}

impl MockFramebuffer {
    /// Create a new framebuffer with the given dimensions, initialized to black
    pub fn new(width: u32, height: u32) -> Self {
        let buffer = vec![0u8; (width * height * 3) as usize];
        Self {
            width,
            height,
            buffer,
            viewport_height: None,
            page_source: None,
        }
    }

    /// Create a framebuffer initialized to a specific color
    pub fn with_color(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut fb = Self::new(width, height);
        fb.fill(color);
        fb
    }

    /// Load a framebuffer from PNG image bytes
    pub fn from_png_bytes(data: &[u8]) -> CaptureResult<Self> {
        let rgb = image::load_from_memory(data)?.to_rgb8();
        Ok(Self {
            width: rgb.width(),
            height: rgb.height(),
            buffer: rgb.into_raw(),
            viewport_height: None,
            page_source: None,
        })
    }

    /// Limit non-full-page screenshots to the top `height` rows
    pub fn with_viewport(mut self, height: u32) -> Self {
        self.viewport_height = Some(height.min(self.height));
        self
    }

    /// HTML returned by `page_source()`
    pub fn with_page_source(mut self, html: impl Into<String>) -> Self {
        self.page_source = Some(html.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill the entire framebuffer with a color
    pub fn fill(&mut self, color: [u8; 3]) {
        for chunk in self.buffer.chunks_exact_mut(3) {
            chunk.copy_from_slice(&color);
        }
    }

    /// Draw a filled rectangle
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Draw text using font8x8 glyphs
    ///
    /// Each character is 8x8 pixels. Text does not wrap.
    pub fn draw_text(&mut self, x: u32, y: u32, text: &str, fg: [u8; 3], bg: [u8; 3]) {
        let mut cursor_x = x;
        for ch in text.chars() {
            self.draw_char(cursor_x, y, ch, fg, bg);
            cursor_x += 8;
            if cursor_x >= self.width {
                break;
            }
        }
    }

    fn draw_char(&mut self, x: u32, y: u32, ch: char, fg: [u8; 3], bg: [u8; 3]) {
        let glyph = BASIC_FONTS.get(ch).unwrap_or([0u8; 8]);
        for (row_idx, row) in glyph.iter().enumerate() {
            let py = y + row_idx as u32;
            if py >= self.height {
                break;
            }
            for bit in 0..8 {
                let px = x + bit;
                if px >= self.width {
                    break;
                }
                // font8x8 stores LSB as leftmost pixel
                let is_fg = (row >> bit) & 1 == 1;
                self.set_pixel(px, py, if is_fg { fg } else { bg });
            }
        }
    }

    /// Get the color of a pixel
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0];
        }
        let idx = ((y * self.width + x) * 3) as usize;
        [self.buffer[idx], self.buffer[idx + 1], self.buffer[idx + 2]]
    }

    /// Set the color of a pixel
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.buffer[idx..idx + 3].copy_from_slice(&color);
    }

    fn to_image(&self) -> CaptureResult<RgbImage> {
        ImageBuffer::from_raw(self.width, self.height, self.buffer.clone()).ok_or_else(|| {
            CaptureError::Screenshot(format!(
                "buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }

    /// Encode the framebuffer as PNG bytes
    pub fn to_png(&self) -> CaptureResult<Vec<u8>> {
        encode_png(&self.to_image()?)
    }
}

fn encode_png(img: &RgbImage) -> CaptureResult<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

impl CaptureTarget for MockFramebuffer {
    fn screenshot(&self, full_page: bool) -> CaptureResult<Vec<u8>> {
        match self.viewport_height {
            Some(viewport) if !full_page => {
                let img = self.to_image()?;
                let cropped = image::imageops::crop_imm(&img, 0, 0, self.width, viewport).to_image();
                encode_png(&cropped)
            }
            _ => self.to_png(),
        }
    }

    fn page_source(&self) -> CaptureResult<Option<String>> {
        Ok(self.page_source.clone())
    }

    fn source_type(&self) -> &str {
        "mock"
    }
}
