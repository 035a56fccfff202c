//! Pixel buffers and PNG export.

use crate::{Error, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

/// Pixel layout of a `Bitmap`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BitmapFormat {
    /// 8 bits per channel, red-green-blue-alpha, unpremultiplied
    Rgba8,
}

impl BitmapFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            BitmapFormat::Rgba8 => 4,
        }
    }
}

/// A rendered frame
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: BitmapFormat,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// A bitmap filled with one colour.
    pub fn new(width: u32, height: u32, format: BitmapFormat, fill: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * format.bytes_per_pixel());
        for _ in 0..count {
            pixels.extend_from_slice(&fill);
        }
        Self {
            width,
            height,
            format,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> BitmapFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Row stride in bytes
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = y as usize * self.row_bytes() + x as usize * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    /// Fill a rectangle, clipped to the bitmap. Source-over blending when
    /// `rgba` is translucent.
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, rgba: [u8; 4]) {
        let x0 = x.max(0) as i64;
        let y0 = y.max(0) as i64;
        let x1 = (x as i64 + width as i64).min(self.width as i64);
        let y1 = (y as i64 + height as i64).min(self.height as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let stride = self.row_bytes();
        for py in y0..y1 {
            let row = py as usize * stride;
            for px in x0..x1 {
                let i = row + px as usize * 4;
                let dst = &mut self.pixels[i..i + 4];
                blend(dst, rgba);
            }
        }
    }

    /// Encode as an 8-bit RGBA PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_png_to(&mut out)?;
        Ok(out)
    }

    /// Write the PNG to `path`, replacing any existing file.
    pub fn write_png(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        let data = self.encode_png()?;
        std::fs::write(path, &data)
            .map_err(|e| Error::ExportError(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(data)
    }

    fn write_png_to<W: Write>(&self, w: W) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::ExportError(format!(
                "cannot encode an empty {}x{} bitmap",
                self.width, self.height
            )));
        }
        let mut encoder = png::Encoder::new(w, self.width, self.height);
        match self.format {
            BitmapFormat::Rgba8 => {
                encoder.set_color(png::ColorType::Rgba);
                encoder.set_depth(png::BitDepth::Eight);
            }
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.pixels)?;
        writer.finish()?;
        Ok(())
    }
}

/// Hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn blend(dst: &mut [u8], src: [u8; 4]) {
    let a = src[3] as u32;
    if a == 255 {
        dst.copy_from_slice(&src);
        return;
    }
    if a == 0 {
        return;
    }
    let inv = 255 - a;
    for c in 0..3 {
        dst[c] = ((src[c] as u32 * a + dst[c] as u32 * inv) / 255) as u8;
    }
    dst[3] = (a + dst[3] as u32 * inv / 255).min(255) as u8;
}
