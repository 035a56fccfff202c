/// Paint commands produced from a layout

use super::layout::{ElementType, LayoutNode};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: (u8, u8, u8, u8),
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        scale: u32,
        rgba: (u8, u8, u8, u8),
    },
}

const TEXT: (u8, u8, u8, u8) = (0, 0, 0, 255);
const HEADING_TEXT: (u8, u8, u8, u8) = (32, 32, 96, 255);
const TITLE_BAND: (u8, u8, u8, u8) = (232, 232, 240, 255);
const PRE_BAND: (u8, u8, u8, u8) = (245, 245, 245, 255);

/// Build the display list: background first, then one band and one text run per node.
pub fn build_display_list(
    nodes: &[LayoutNode],
    width: u32,
    height: u32,
    background: (u8, u8, u8, u8),
) -> Vec<PaintCommand> {
    let mut cmds = vec![PaintCommand::SolidRect {
        x: 0,
        y: 0,
        width,
        height,
        rgba: background,
    }];

    for node in nodes {
        let rect = &node.lb.rect;
        let band = match node.elem_type {
            ElementType::Title => Some(TITLE_BAND),
            ElementType::Preformatted => Some(PRE_BAND),
            _ => None,
        };
        if let Some(rgba) = band {
            cmds.push(PaintCommand::SolidRect {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                rgba,
            });
        }
        let pad = node.lb.box_model.padding as i32;
        cmds.push(PaintCommand::Text {
            x: rect.x + pad,
            y: rect.y + pad,
            text: node.text.clone(),
            scale: node.scale,
            rgba: match node.elem_type {
                ElementType::Heading => HEADING_TEXT,
                _ => TEXT,
            },
        });
    }

    cmds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::layout::{BoxModel, LayoutBox, Rect};

    fn node(elem_type: ElementType) -> LayoutNode {
        LayoutNode {
            lb: LayoutBox {
                rect: Rect { x: 8, y: 10, width: 100, height: 20 },
                box_model: BoxModel { margin: 6, border: 0, padding: 6 },
            },
            text: "hi".into(),
            elem_type,
            scale: 1,
        }
    }

    #[test]
    fn background_comes_first() {
        let cmds = build_display_list(&[], 10, 10, (255, 255, 255, 255));
        assert_eq!(cmds.len(), 1);
        match &cmds[0] {
            PaintCommand::SolidRect { width, height, .. } => assert_eq!((*width, *height), (10, 10)),
            _ => panic!("unexpected"),
        }
    }

    #[test]
    fn titles_get_a_band_paragraphs_do_not() {
        let cmds = build_display_list(&[node(ElementType::Title)], 50, 50, (255, 255, 255, 255));
        assert_eq!(cmds.len(), 3);
        let cmds = build_display_list(&[node(ElementType::Paragraph)], 50, 50, (255, 255, 255, 255));
        assert_eq!(cmds.len(), 2);
        match &cmds[1] {
            PaintCommand::Text { x, y, rgba, .. } => {
                assert_eq!((*x, *y), (14, 16));
                assert_eq!(*rgba, (0, 0, 0, 255));
            }
            _ => panic!("unexpected"),
        }
    }
}
