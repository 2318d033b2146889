//! PDF content stream generation.
//!
//! This module provides:
//! - Content stream operators for lines, filled rectangles, images and text
//! - Conversion from top-left layout coordinates to PDF user space
//! - Flate compression shared by streams, images and fonts

use std::io::Write;

/// Format a coordinate with at most two decimals and no trailing zeros.
fn num(value: f64) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Builder for a page content stream. Inputs use the layout convention
/// (origin top-left, y growing downwards).
pub struct ContentBuilder {
    pub content_parts: Vec<String>,
    page_height: f64,
}

impl ContentBuilder {
    pub fn new(page_height: f64) -> Self {
        Self {
            content_parts: Vec::new(),
            page_height,
        }
    }

    fn flip(&self, y: f64) -> f64 {
        self.page_height - y
    }

    pub fn line_width(&mut self, width: f64) {
        self.content_parts.push(format!("{} w\n", num(width)));
    }

    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.content_parts.push(format!(
            "{} {} m {} {} l S\n",
            num(x1),
            num(self.flip(y1)),
            num(x2),
            num(self.flip(y2))
        ));
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, rgb: [u8; 3]) {
        let [r, g, b] = rgb.map(|c| num(f64::from(c) / 255.0));
        self.content_parts.push(format!(
            "q {} {} {} rg {} {} {} {} re f Q\n",
            r,
            g,
            b,
            num(x),
            num(self.flip(y + h)),
            num(w),
            num(h)
        ));
    }

    /// Draw the image XObject `name` scaled into the given rectangle.
    pub fn image(&mut self, name: &str, x: f64, y: f64, w: f64, h: f64) {
        self.content_parts.push(format!(
            "q {} 0 0 {} {} {} cm /{} Do Q\n",
            num(w),
            num(h),
            num(x),
            num(self.flip(y + h)),
            name
        ));
    }

    /// Show hex-encoded glyph ids in black with its baseline at `y`.
    pub fn text(&mut self, font_name: &str, size: f64, x: f64, y: f64, hex_glyphs: &str) {
        self.content_parts.push(format!(
            "q BT 0 g /{} {} Tf {} {} Td <{}> Tj ET Q\n",
            font_name,
            num(size),
            num(x),
            num(self.flip(y)),
            hex_glyphs
        ));
    }

    /// Build the final content bytes
    pub fn build_content_bytes(&self) -> Vec<u8> {
        self.content_parts.concat().into_bytes()
    }
}

/// Compress data using zlib/flate2
pub fn compress_data(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
