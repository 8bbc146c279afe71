//! Styled document tree
//!
//! A small arena built from a `scraper` document. Every element becomes a
//! `StyledNode` carrying its tag, id, classes, direct text and parsed inline
//! style. The capture region owns the live tree; exports work on clones.

use scraper::{ElementRef, Html};
use std::fmt;

/// Index of a node inside a `StyledTree` (document order, root element = 0)
pub type NodeIndex = usize;

/// Tags that never produce boxes
const NON_RENDERED: &[&str] = &["head", "title", "meta", "link", "script", "style", "template"];

/// An RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Parse a CSS colour value.
    ///
    /// Supports hex notation, `rgb()`/`rgba()`, a handful of keywords and the
    /// first colour stop of a `linear-gradient(...)`. A trailing `!important`
    /// is ignored.
    pub fn parse(value: &str) -> Option<Color> {
        let v = value.trim();
        let v = v.strip_suffix("!important").unwrap_or(v).trim().to_ascii_lowercase();

        if let Some(hex) = v.strip_prefix('#') {
            return parse_hex(hex);
        }
        if let Some(args) = function_args(&v, "rgba").or_else(|| function_args(&v, "rgb")) {
            return parse_rgb_args(args);
        }
        if let Some(args) = function_args(&v, "linear-gradient") {
            return split_top_level(args, ',')
                .into_iter()
                .find_map(|stop| parse_color_stop(stop.trim()));
        }

        match v.as_str() {
            "black" => Some(Color::BLACK),
            "white" => Some(Color::WHITE),
            "transparent" => Some(Color::TRANSPARENT),
            "red" => Some(Color::rgb(255, 0, 0)),
            "green" => Some(Color::rgb(0, 128, 0)),
            "blue" => Some(Color::rgb(0, 0, 255)),
            "gray" | "grey" => Some(Color::rgb(128, 128, 128)),
            "orange" => Some(Color::rgb(255, 165, 0)),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok().map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Color::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn function_args<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value
        .strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_rgb_args(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 3 {
        return None;
    }
    let channel = |p: &str| -> Option<u8> {
        if let Some(pct) = p.strip_suffix('%') {
            let f: f32 = pct.parse().ok()?;
            Some((f.clamp(0.0, 100.0) * 2.55).round() as u8)
        } else {
            let f: f32 = p.parse().ok()?;
            Some(f.clamp(0.0, 255.0).round() as u8)
        }
    };
    let alpha = match parts.get(3) {
        Some(p) => {
            let f: f32 = match p.strip_suffix('%') {
                Some(pct) => pct.parse::<f32>().ok()? / 100.0,
                None => p.parse().ok()?,
            };
            (f.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Color::rgba(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, alpha))
}

// A gradient stop is "<color> [<position>]"; direction arguments never parse.
fn parse_color_stop(stop: &str) -> Option<Color> {
    Color::parse(stop).or_else(|| {
        let (color, _position) = stop.rsplit_once(char::is_whitespace)?;
        Color::parse(color)
    })
}

/// Split on `sep` outside of parentheses
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Ordered inline style declarations (`style="a: b; c: d"`).
///
/// Order is preserved so that overriding a property and putting the saved
/// value back yields an identical declaration list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<(String, String)>,
}

impl InlineStyle {
    pub fn parse(text: &str) -> Self {
        let declarations = split_top_level(text, ';')
            .into_iter()
            .filter_map(|decl| {
                let (prop, value) = decl.split_once(':')?;
                let prop = prop.trim().to_ascii_lowercase();
                let value = value.trim();
                if prop.is_empty() || value.is_empty() {
                    return None;
                }
                Some((prop, value.to_string()))
            })
            .collect();
        Self { declarations }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }

    /// Set a declaration, replacing an existing one in place.
    pub fn set(&mut self, property: &str, value: &str) {
        match self.declarations.iter_mut().find(|(p, _)| p == property) {
            Some(decl) => decl.1 = value.to_string(),
            None => self.declarations.push((property.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, property: &str) -> Option<String> {
        let pos = self.declarations.iter().position(|(p, _)| p == property)?;
        Some(self.declarations.remove(pos).1)
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.declarations.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (p, v)) in self.declarations.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {};", p, v)?;
        }
        Ok(())
    }
}

/// One element of the styled tree
#[derive(Debug, Clone, PartialEq)]
pub struct StyledNode {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// Direct text children, whitespace-collapsed
    pub text: String,
    pub style: InlineStyle,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
}

impl StyledNode {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn is_hidden(&self) -> bool {
        self.style.get("display").map(str::trim) == Some("none")
    }

    /// Whether this element can produce a box at all
    pub fn is_rendered(&self) -> bool {
        !self.is_hidden() && !NON_RENDERED.contains(&self.tag.as_str())
    }

    /// SVG text content elements, which paint with `fill` instead of `color`
    pub fn is_vector_text(&self) -> bool {
        matches!(self.tag.as_str(), "text" | "tspan" | "textpath")
    }
}

/// Arena of styled elements in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyledTree {
    nodes: Vec<StyledNode>,
}

/// Pre-order walk over the elements of a document.
///
/// The position of an element in the returned vector is its `NodeIndex`, so
/// any code that needs to pair `scraper` elements with tree nodes goes through
/// this walk.
pub(crate) fn walk_elements(document: &Html) -> Vec<(ElementRef<'_>, Option<NodeIndex>)> {
    let mut out = Vec::new();
    let mut stack: Vec<(ElementRef<'_>, Option<NodeIndex>)> = vec![(document.root_element(), None)];
    while let Some((element, parent)) = stack.pop() {
        let idx = out.len();
        out.push((element, parent));
        let children: Vec<_> = element.children().filter_map(ElementRef::wrap).collect();
        for child in children.into_iter().rev() {
            stack.push((child, Some(idx)));
        }
    }
    out
}

impl StyledTree {
    pub fn from_html(document: &Html) -> Self {
        let walked = walk_elements(document);
        let mut nodes: Vec<StyledNode> = Vec::with_capacity(walked.len());

        for (element, parent) in walked {
            let value = element.value();
            let text = element
                .children()
                .filter_map(|c| c.value().as_text())
                .flat_map(|t| t.split_whitespace())
                .collect::<Vec<_>>()
                .join(" ");
            let idx = nodes.len();
            nodes.push(StyledNode {
                tag: value.name().to_ascii_lowercase(),
                id: value.id().map(|s| s.to_string()),
                classes: value.classes().map(|s| s.to_string()).collect(),
                text,
                style: value.attr("style").map(InlineStyle::parse).unwrap_or_default(),
                parent,
                children: Vec::new(),
            });
            if let Some(p) = parent {
                nodes[p].children.push(idx);
            }
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: NodeIndex) -> &StyledNode {
        &self.nodes[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut StyledNode {
        &mut self.nodes[idx]
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&StyledNode> {
        self.nodes.get(idx)
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeIndex> {
        self.nodes.iter().position(|n| n.id.as_deref() == Some(id))
    }

    /// Indices of every node carrying `class`, in document order
    pub fn find_by_class(&self, class: &str) -> Vec<NodeIndex> {
        (0..self.nodes.len()).filter(|&i| self.nodes[i].has_class(class)).collect()
    }

    /// True when `idx` sits strictly below `ancestor`
    pub fn is_descendant(&self, idx: NodeIndex, ancestor: NodeIndex) -> bool {
        let mut cur = self.nodes.get(idx).and_then(|n| n.parent);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.nodes[p].parent;
        }
        false
    }

    /// Effective text colour: nearest `color` declaration up the ancestor chain
    pub fn computed_color(&self, idx: NodeIndex) -> Color {
        let mut cur = Some(idx);
        while let Some(i) = cur {
            let node = &self.nodes[i];
            let declared = if node.is_vector_text() {
                node.style.get("fill").or_else(|| node.style.get("color"))
            } else {
                node.style.get("color")
            };
            if let Some(c) = declared.and_then(Color::parse) {
                return c;
            }
            cur = node.parent;
        }
        Color::BLACK
    }

    /// Background fill of a single element (not inherited)
    pub fn background(&self, idx: NodeIndex) -> Option<Color> {
        let style = &self.nodes[idx].style;
        style
            .get("background-color")
            .or_else(|| style.get("background"))
            .and_then(Color::parse)
            .filter(|c| !c.is_transparent())
    }

    pub fn has_box_shadow(&self, idx: NodeIndex) -> bool {
        self.nodes[idx]
            .style
            .get("box-shadow")
            .map(|v| v.trim() != "none")
            .unwrap_or(false)
    }

    /// All text under `idx`, skipping hidden subtrees
    pub fn text_content(&self, idx: NodeIndex) -> String {
        let mut parts = Vec::new();
        self.collect_text(idx, &mut parts);
        parts.join(" ")
    }

    fn collect_text<'a>(&'a self, idx: NodeIndex, out: &mut Vec<&'a str>) {
        let node = &self.nodes[idx];
        if !node.is_rendered() {
            return;
        }
        if !node.text.is_empty() {
            out.push(&node.text);
        }
        for &child in &node.children {
            self.collect_text(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_color_forms() {
        assert_eq!(Color::parse("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse("#10b981"), Some(Color::rgb(0x10, 0xb9, 0x81)));
        assert_eq!(Color::parse("#000000 !important"), Some(Color::BLACK));
        assert_eq!(
            Color::parse("rgba(255, 255, 255, 0.15)"),
            Some(Color::rgba(255, 255, 255, 38))
        );
        assert_eq!(Color::parse("rgb(239 68 68)"), Some(Color::rgb(239, 68, 68)));
        assert_eq!(Color::parse("transparent"), Some(Color::TRANSPARENT));
        assert_eq!(Color::parse("none"), None);
        assert_eq!(Color::parse("#12"), None);
    }

    #[test]
    fn gradient_uses_first_color_stop() {
        let c = Color::parse("linear-gradient(135deg, #1e293b 0%, #0f172a 100%)");
        assert_eq!(c, Some(Color::rgb(0x1e, 0x29, 0x3b)));
        let c = Color::parse("linear-gradient(to right, rgba(0, 0, 0, 0.5), white)");
        assert_eq!(c, Some(Color::rgba(0, 0, 0, 128)));
    }

    #[test]
    fn inline_style_set_and_restore_is_identical() {
        let original = InlineStyle::parse("color: red; background-color: #123456; margin: 0");
        let mut style = original.clone();
        let saved = style.get("background-color").map(str::to_string);
        style.set("background-color", "#ffffff");
        assert_eq!(style.get("background-color"), Some("#ffffff"));
        match saved {
            Some(v) => style.set("background-color", &v),
            None => {
                style.remove("background-color");
            }
        }
        assert_eq!(style, original);
        assert_eq!(
            style.to_string(),
            "color: red; background-color: #123456; margin: 0;"
        );
    }

    #[test]
    fn inline_style_keeps_parenthesized_semicolons() {
        let s = InlineStyle::parse("background: url(data:image/png;base64,AAA); color: #000");
        assert_eq!(s.get("background"), Some("url(data:image/png;base64,AAA)"));
        assert_eq!(s.get("color"), Some("#000"));
    }

    #[test]
    fn builds_tree_in_document_order() {
        let html = Html::parse_document(
            r#"<html><body><div id="a" class="x y" style="color: #fff">Hello <b>bold</b> world</div><p>tail</p></body></html>"#,
        );
        let tree = StyledTree::from_html(&html);
        let a = tree.find_by_id("a").expect("div present");
        let node = tree.node(a);
        assert_eq!(node.tag, "div");
        assert!(node.has_class("y"));
        assert_eq!(node.text, "Hello world");
        assert_eq!(tree.node(node.children[0]).tag, "b");
        assert_eq!(tree.computed_color(node.children[0]), Color::WHITE);
        let p = tree.find_by_class("x");
        assert_eq!(p, vec![a]);
        assert!(tree.is_descendant(node.children[0], a));
        assert!(!tree.is_descendant(a, a));
        assert_eq!(tree.text_content(a), "Hello world bold");
    }

    #[test]
    fn hidden_subtrees_drop_out_of_text_content() {
        let html = Html::parse_document(
            r#"<div id="r"><p>keep</p><div style="display: none"><p>drop</p></div></div>"#,
        );
        let tree = StyledTree::from_html(&html);
        let r = tree.find_by_id("r").unwrap();
        assert_eq!(tree.text_content(r), "keep");
    }
}
