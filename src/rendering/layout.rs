//! Block layout for the capture subtree.
//!
//! Every rendered element becomes a block stacked below its previous sibling.
//! Elements with a background or shadow get padding so their fill is visible
//! around the content. Coordinates are CSS pixels; the rasterizer applies the
//! pixel-density multiplier.

use crate::dom::{Color, InlineStyle, NodeIndex, StyledTree};

/// Padding around elements that paint a background or shadow
const BOX_PADDING: u32 = 12;
/// Vertical gap after a block
const BLOCK_GAP: u32 = 4;
/// Estimated glyph advance as a fraction of the font size
const ADVANCE_RATIO: f32 = 0.6;
const LINE_HEIGHT_RATIO: f32 = 1.4;

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    pub padding: u32,
    pub gap: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
}

impl LayoutBox {
    pub fn content_width(&self) -> u32 {
        self.rect.width.saturating_sub(self.box_model.padding * 2)
    }
}

/// A laid-out element: its box, its wrapped text and the colours to paint.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub node: NodeIndex,
    pub lb: LayoutBox,
    pub lines: Vec<String>,
    pub font_size: f32,
    pub line_height: u32,
    pub color: Color,
    pub background: Option<Color>,
    pub shadow: bool,
}

/// Result of laying out a capture subtree
#[derive(Debug, Clone)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub nodes: Vec<LayoutNode>,
}

pub fn font_size_for(tag: &str) -> f32 {
    match tag {
        "h1" => 28.0,
        "h2" => 22.0,
        "h3" => 18.0,
        "h4" => 16.0,
        "small" => 11.0,
        _ => 14.0,
    }
}

/// Greedy word wrap against an estimated advance width
pub fn wrap_text(text: &str, width: u32, font_size: f32) -> Vec<String> {
    let advance = (font_size * ADVANCE_RATIO).max(1.0);
    let chars_per_line = ((width as f32 / advance).floor() as usize).max(1);
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        let cur_len = cur.chars().count();
        if cur_len > 0 && cur_len + 1 + word.chars().count() > chars_per_line {
            lines.push(std::mem::take(&mut cur));
        }
        if !cur.is_empty() {
            cur.push(' ');
        }
        cur.push_str(word);
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}

/// Percentage `width` declaration resolved against the available width
fn declared_width(style: &InlineStyle, available: u32) -> Option<u32> {
    let pct: f32 = style.get("width")?.trim().strip_suffix('%')?.trim().parse().ok()?;
    Some((available as f32 * pct.clamp(0.0, 100.0) / 100.0).round() as u32)
}

struct LayoutBuilder<'a> {
    tree: &'a StyledTree,
    root: NodeIndex,
    nodes: Vec<Option<LayoutNode>>,
}

impl LayoutBuilder<'_> {
    // Returns the vertical space consumed, gap included.
    fn block(&mut self, idx: NodeIndex, x: i32, y: u32, width: u32) -> u32 {
        let node = self.tree.node(idx);
        if !node.is_rendered() {
            return 0;
        }

        let width = if idx == self.root { width } else { declared_width(&node.style, width).unwrap_or(width) };
        let background = self.tree.background(idx);
        let shadow = self.tree.has_box_shadow(idx);
        let padding = if background.is_some() || shadow || idx == self.root { BOX_PADDING } else { 0 };
        let inner_width = width.saturating_sub(padding * 2);

        let font_size = font_size_for(&node.tag);
        let line_height = (font_size * LINE_HEIGHT_RATIO).ceil() as u32;
        let lines = wrap_text(&node.text, inner_width, font_size);

        // Reserve the slot first so a parent's background paints under its children.
        let slot = self.nodes.len();
        self.nodes.push(None);

        let mut cursor = y + padding + lines.len() as u32 * line_height;
        for &child in &node.children {
            cursor += self.block(child, x + padding as i32, cursor, inner_width);
        }
        let height = cursor + padding - y;

        let box_model = BoxModel { padding, gap: BLOCK_GAP };
        let consumed = if height == 0 { 0 } else { height + box_model.gap };
        self.nodes[slot] = Some(LayoutNode {
            node: idx,
            lb: LayoutBox { rect: Rect { x, y: y as i32, width, height }, box_model },
            lines,
            font_size,
            line_height,
            color: self.tree.computed_color(idx),
            background,
            shadow,
        });
        consumed
    }
}

/// Lay out the subtree rooted at `root` within `width` CSS pixels.
pub fn layout_tree(tree: &StyledTree, root: NodeIndex, width: u32) -> Layout {
    let mut builder = LayoutBuilder { tree, root, nodes: Vec::new() };
    let consumed = builder.block(root, 0, 0, width);
    let height = consumed.saturating_sub(BLOCK_GAP).max(1);
    Layout {
        width: width.max(1),
        height,
        nodes: builder.nodes.into_iter().flatten().collect(),
    }
}
