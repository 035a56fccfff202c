/// Rasterizer: paint commands into an RGBA8 bitmap

use super::layout::GLYPH_SIZE;
use super::paint::PaintCommand;
use crate::bitmap::{Bitmap, BitmapFormat};

/// Execute `commands` in order on a fresh transparent bitmap.
///
/// There is no font rasterizer: each visible character is drawn as a solid
/// glyph block inside its cell, which keeps line structure and text density
/// visible in the output.
pub fn rasterize(commands: &[PaintCommand], width: u32, height: u32) -> Bitmap {
    let mut bitmap = Bitmap::new(width, height, BitmapFormat::Rgba8, [0, 0, 0, 0]);
    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect {
                x,
                y,
                width,
                height,
                rgba,
            } => bitmap.fill_rect(*x, *y, *width, *height, [rgba.0, rgba.1, rgba.2, rgba.3]),
            PaintCommand::Text {
                x,
                y,
                text,
                scale,
                rgba,
            } => draw_text(&mut bitmap, *x, *y, text, *scale, [rgba.0, rgba.1, rgba.2, rgba.3]),
        }
    }
    bitmap
}

fn draw_text(bitmap: &mut Bitmap, x: i32, y: i32, text: &str, scale: u32, rgba: [u8; 4]) {
    let scale = scale.max(1);
    let cell = (GLYPH_SIZE * scale) as i32;
    let ink = (GLYPH_SIZE - 2) * scale;
    for (row, line) in text.lines().enumerate() {
        let cy = y + row as i32 * cell;
        if cy >= bitmap.height() as i32 {
            break;
        }
        for (col, ch) in line.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let cx = x + col as i32 * cell;
            if cx >= bitmap.width() as i32 {
                break;
            }
            bitmap.fill_rect(cx + scale as i32, cy + scale as i32, ink, ink, rgba);
        }
    }
}
