//! Paint commands produced from a layout

use crate::dom::Color;
use crate::rendering::layout::Layout;

/// Offset of the painted drop shadow, in CSS pixels
const SHADOW_OFFSET: i32 = 4;
const SHADOW_COLOR: Color = Color::rgba(0, 0, 0, 64);

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
        size: f32,
        rgba: (u8, u8, u8, u8),
    },
}

fn rgba(c: Color) -> (u8, u8, u8, u8) {
    (c.r, c.g, c.b, c.a)
}

/// Build the display list in paint order: shadow, background, then text.
pub fn build_display_list(layout: &Layout) -> Vec<PaintCommand> {
    let mut cmds = Vec::new();
    for node in &layout.nodes {
        let rect = &node.lb.rect;
        if node.shadow {
            cmds.push(PaintCommand::SolidRect {
                x: rect.x + SHADOW_OFFSET,
                y: rect.y + SHADOW_OFFSET,
                width: rect.width,
                height: rect.height,
                rgba: rgba(SHADOW_COLOR),
            });
        }
        if let Some(bg) = node.background {
            cmds.push(PaintCommand::SolidRect {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                rgba: rgba(bg),
            });
        }
        let pad = node.lb.box_model.padding as i32;
        for (i, line) in node.lines.iter().enumerate() {
            cmds.push(PaintCommand::Text {
                x: rect.x + pad,
                y: rect.y + pad + (i as u32 * node.line_height) as i32,
                text: line.clone(),
                size: node.font_size,
                rgba: rgba(node.color),
            });
        }
    }
    cmds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::StyledTree;
    use crate::rendering::layout::layout_tree;
    use scraper::Html;

    #[test]
    fn backgrounds_paint_before_their_text() {
        let html = Html::parse_document(
            r##"<div id="r" style="background-color: #1e293b; box-shadow: 0 4px 6px #000; color: white"><p>Hello</p></div>"##,
        );
        let tree = StyledTree::from_html(&html);
        let root = tree.find_by_id("r").unwrap();
        let cmds = build_display_list(&layout_tree(&tree, root, 200));

        assert_eq!(cmds.len(), 3);
        match &cmds[0] {
            PaintCommand::SolidRect { x, rgba, .. } => {
                assert_eq!(*x, SHADOW_OFFSET);
                assert_eq!(rgba.3, 64);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &cmds[1] {
            PaintCommand::SolidRect { rgba, .. } => assert_eq!(*rgba, (0x1e, 0x29, 0x3b, 255)),
            other => panic!("unexpected {:?}", other),
        }
        match &cmds[2] {
            PaintCommand::Text { text, rgba, .. } => {
                assert_eq!(text, "Hello");
                assert_eq!(*rgba, (255, 255, 255, 255));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
