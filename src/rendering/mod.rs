//! Rendering pipeline: layout, paint, raster

pub mod layout;
pub mod paint;
pub mod raster;

use crate::bitmap::Bitmap;
use crate::dom::Document;
use crate::Viewport;

const DEFAULT_BACKGROUND: (u8, u8, u8) = (255, 255, 255);

/// Render a document into a fresh bitmap of the viewport's size.
pub fn render_document(document: &Document, viewport: Viewport, transparent: bool) -> Bitmap {
    let html = document.html();
    let nodes = layout::layout_document(&html, viewport);
    let background = background_rgba(document.background, transparent);
    let cmds = paint::build_display_list(&nodes, viewport.width, viewport.height, background);
    raster::rasterize(&cmds, viewport.width, viewport.height)
}

/// Background-only frame for a view that has no document yet.
pub fn render_blank(viewport: Viewport, transparent: bool) -> Bitmap {
    let background = background_rgba(None, transparent);
    let cmds = paint::build_display_list(&[], viewport.width, viewport.height, background);
    raster::rasterize(&cmds, viewport.width, viewport.height)
}

// An explicit page background wins over transparency.
fn background_rgba(explicit: Option<(u8, u8, u8)>, transparent: bool) -> (u8, u8, u8, u8) {
    match (explicit, transparent) {
        (Some((r, g, b)), _) => (r, g, b, 255),
        (None, true) => (0, 0, 0, 0),
        (None, false) => (DEFAULT_BACKGROUND.0, DEFAULT_BACKGROUND.1, DEFAULT_BACKGROUND.2, 255),
    }
}
