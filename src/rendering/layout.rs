/// Very small block layout: text blocks stacked top to bottom

use crate::Viewport;
use scraper::{ElementRef, Html, Selector};

/// Width and height of one glyph cell at scale 1
pub const GLYPH_SIZE: u32 = 8;

const BLOCK_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "pre", "blockquote", "dt", "dd", "td", "th",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    pub margin: u32,
    pub border: u32,
    pub padding: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Title,
    Heading,
    Paragraph,
    Preformatted,
}

/// A layout node couples a `LayoutBox` with wrapped text and element type.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub lb: LayoutBox,
    /// Text already wrapped to the box, one line per `\n`
    pub text: String,
    pub elem_type: ElementType,
    pub scale: u32,
}

/// Compute a block layout for the document and viewport.
///
/// - The `<title>` is shown as a banner when the page has no `<h1>`
/// - `h1` renders at scale 2, every other block at scale 1
/// - Blocks nested inside another block are folded into their ancestor
pub fn layout_document(document: &Html, viewport: Viewport) -> Vec<LayoutNode> {
    let mut y = 8u32;
    let mut nodes = Vec::new();

    let has_h1 = Selector::parse("h1")
        .ok()
        .map(|sel| document.select(&sel).next().is_some())
        .unwrap_or(false);
    if !has_h1 {
        let title = Selector::parse("title")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .map(|n| n.text().collect::<String>())
            .unwrap_or_default();
        if !title.trim().is_empty() {
            if let Some(node) = block(&title, ElementType::Title, 2, y, viewport) {
                y += node.lb.rect.height + node.lb.box_model.margin;
                nodes.push(node);
            }
        }
    }

    let Ok(block_sel) = Selector::parse(&BLOCK_TAGS.join(", ")) else {
        return nodes;
    };
    for el in document.select(&block_sel) {
        if y >= viewport.height {
            break;
        }
        if nested_in_block(el) {
            continue;
        }
        let (elem_type, scale) = match el.value().name() {
            "h1" => (ElementType::Title, 2),
            "h2" | "h3" | "h4" | "h5" | "h6" => (ElementType::Heading, 1),
            "pre" => (ElementType::Preformatted, 1),
            _ => (ElementType::Paragraph, 1),
        };
        let text = el.text().collect::<String>();
        if let Some(node) = block(&text, elem_type, scale, y, viewport) {
            y += node.lb.rect.height + node.lb.box_model.margin;
            nodes.push(node);
        }
    }

    nodes
}

fn nested_in_block(el: ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| BLOCK_TAGS.contains(&a.value().name()))
}

fn block(text: &str, elem_type: ElementType, scale: u32, y: u32, viewport: Viewport) -> Option<LayoutNode> {
    let padding = if scale > 1 { 8 } else { 6 };
    let margin = padding;
    let width = viewport.width.saturating_sub(16);
    let content_w = width.saturating_sub(padding * 2);
    let chars_per_line = (content_w / (GLYPH_SIZE * scale)).max(1) as usize;

    let lines = match elem_type {
        ElementType::Preformatted => text
            .lines()
            .map(|l| l.chars().take(chars_per_line).collect::<String>())
            .collect::<Vec<_>>(),
        _ => wrap(text, chars_per_line),
    };
    if lines.iter().all(|l| l.trim().is_empty()) {
        return None;
    }

    let line_count = lines.len() as u32;
    let height = line_count * GLYPH_SIZE * scale + padding * 2;
    Some(LayoutNode {
        lb: LayoutBox {
            rect: Rect {
                x: 8,
                y: y as i32,
                width,
                height,
            },
            box_model: BoxModel {
                margin,
                border: 0,
                padding,
            },
        },
        text: lines.join("\n"),
        elem_type,
        scale,
    })
}

/// Greedy word wrap; words longer than a line are split.
pub fn wrap(text: &str, chars_per_line: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > chars_per_line {
            if !cur.is_empty() {
                lines.push(std::mem::take(&mut cur));
            }
            let rest = word.split_off(chars_per_line);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let cur_len = cur.chars().count();
        if !cur.is_empty() && cur_len + 1 + word.chars().count() > chars_per_line {
            lines.push(std::mem::take(&mut cur));
        }
        if !cur.is_empty() {
            cur.push(' ');
        }
        cur.push_str(&word);
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}
