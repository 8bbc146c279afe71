//! Software rasterizer: runs a display list into an RGBA pixel buffer.
//!
//! Text uses `fontdue` with the first system font that loads. When no font is
//! available every glyph is drawn as a solid box so text is still visible in
//! the output.

use crate::dom::{Color, NodeIndex, StyledTree};
use crate::rendering::layout::layout_tree;
use crate::rendering::paint::{build_display_list, PaintCommand};
use crate::rendering::RasterImage;
use crate::{Error, Result, Viewport};
use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::Arc;

/// Largest raster edge accepted, in device pixels
pub const MAX_RASTER_DIMENSION: u32 = 16_384;

const FONT_SEARCH_PATHS: &[&str] = &[
    // Linux
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    // macOS
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    // Windows
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

/// Inputs to a rasterization besides the tree itself
#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Device pixels per CSS pixel
    pub pixel_ratio: f32,
    /// Fill behind everything that is painted
    pub background: Color,
    pub viewport: Viewport,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            pixel_ratio: 2.0,
            background: Color::WHITE,
            viewport: Viewport::default(),
        }
    }
}

/// Converts a styled subtree into a raster image
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, tree: &StyledTree, root: NodeIndex, options: &RasterOptions) -> Result<RasterImage>;
}

/// CPU rasterizer built on `image` and `fontdue`
#[derive(Clone, Default)]
pub struct SoftwareRasterizer {
    font: Option<Arc<Font>>,
}

impl std::fmt::Debug for SoftwareRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareRasterizer")
            .field("font", &self.font.is_some())
            .finish()
    }
}

impl SoftwareRasterizer {
    /// Use the first system font found, falling back to box glyphs.
    pub fn new() -> Self {
        let font = FONT_SEARCH_PATHS
            .iter()
            .find_map(|p| load_font(Path::new(p)).ok())
            .map(Arc::new);
        if font.is_none() {
            log::warn!("no system font found; text will be drawn as glyph boxes");
        }
        Self { font }
    }

    pub fn with_font_file(path: &Path) -> Result<Self> {
        Ok(Self { font: Some(Arc::new(load_font(path)?)) })
    }

    /// Deterministic output regardless of installed fonts
    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

fn load_font(path: &Path) -> Result<Font> {
    let data = std::fs::read(path)?;
    Font::from_bytes(data, FontSettings::default())
        .map_err(|e| Error::ConfigError(format!("failed to load font {}: {}", path.display(), e)))
}

impl Rasterizer for SoftwareRasterizer {
    fn rasterize(&self, tree: &StyledTree, root: NodeIndex, options: &RasterOptions) -> Result<RasterImage> {
        let ratio = options.pixel_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(Error::RenderError(format!("invalid pixel ratio {}", ratio)));
        }
        if tree.get(root).is_none() {
            return Err(Error::RenderError(format!("root node {} is not in the tree", root)));
        }

        let layout = layout_tree(tree, root, options.viewport.width);
        let width = (layout.width as f32 * ratio).ceil() as u64;
        let height = (layout.height as f32 * ratio).ceil() as u64;
        if width > MAX_RASTER_DIMENSION as u64 || height > MAX_RASTER_DIMENSION as u64 {
            return Err(Error::RenderError(format!(
                "capture of {}x{} px exceeds the {} px raster limit",
                width, height, MAX_RASTER_DIMENSION
            )));
        }

        let commands = build_display_list(&layout);
        log::debug!(
            "rasterizing {} paint commands into {}x{} px",
            commands.len(),
            width,
            height
        );

        let mut canvas = Canvas {
            buffer: RgbaImage::from_pixel(width as u32, height as u32, to_pixel(options.background)),
            ratio,
            font: self.font.as_deref(),
        };
        for cmd in &commands {
            canvas.execute(cmd);
        }
        Ok(RasterImage::new(canvas.buffer))
    }
}

fn to_pixel(c: Color) -> Rgba<u8> {
    Rgba([c.r, c.g, c.b, c.a])
}

struct Canvas<'f> {
    buffer: RgbaImage,
    ratio: f32,
    font: Option<&'f Font>,
}

impl Canvas<'_> {
    fn execute(&mut self, cmd: &PaintCommand) {
        match cmd {
            PaintCommand::SolidRect { x, y, width, height, rgba } => {
                let r = self.ratio;
                self.fill_rect(
                    *x as f32 * r,
                    *y as f32 * r,
                    *width as f32 * r,
                    *height as f32 * r,
                    Rgba([rgba.0, rgba.1, rgba.2, rgba.3]),
                );
            }
            PaintCommand::Text { x, y, text, size, rgba } => {
                let color = Rgba([rgba.0, rgba.1, rgba.2, rgba.3]);
                self.draw_text(text, *x as f32 * self.ratio, *y as f32 * self.ratio, size * self.ratio, color);
            }
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
        if color.0[3] == 0 {
            return;
        }
        let (bw, bh) = (self.buffer.width() as f32, self.buffer.height() as f32);
        let x0 = x.max(0.0).round() as u32;
        let y0 = y.max(0.0).round() as u32;
        let x1 = (x + w).min(bw).round().max(0.0) as u32;
        let y1 = (y + h).min(bh).round().max(0.0) as u32;
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend(px, py, color, color.0[3]);
            }
        }
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, size: f32, color: Rgba<u8>) {
        let baseline = y + size;
        let mut cursor_x = x;
        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            match self.font {
                Some(font) => {
                    let (metrics, bitmap) = font.rasterize(ch, size);
                    let gx0 = cursor_x.round() as i32 + metrics.xmin;
                    let gy0 = baseline.round() as i32 - metrics.ymin - metrics.height as i32;
                    for gy in 0..metrics.height {
                        for gx in 0..metrics.width {
                            let coverage = bitmap[gy * metrics.width + gx];
                            if coverage == 0 {
                                continue;
                            }
                            let (px, py) = (gx0 + gx as i32, gy0 + gy as i32);
                            if px >= 0 && py >= 0 {
                                let alpha = ((coverage as u16 * color.0[3] as u16) / 255) as u8;
                                self.blend(px as u32, py as u32, color, alpha);
                            }
                        }
                    }
                    cursor_x += metrics.advance_width;
                }
                None => {
                    if !ch.is_whitespace() {
                        self.fill_rect(cursor_x, baseline - size * 0.7, size * 0.5, size * 0.7, color);
                    }
                    cursor_x += size * 0.6;
                }
            }
        }
    }

    fn blend(&mut self, px: u32, py: u32, fg: Rgba<u8>, alpha: u8) {
        if px >= self.buffer.width() || py >= self.buffer.height() {
            return;
        }
        let bg = *self.buffer.get_pixel(px, py);
        let a = f32::from(alpha) / 255.0;
        let mix = |f: u8, b: u8| (f32::from(f) * a + f32::from(b) * (1.0 - a)).round() as u8;
        self.buffer.put_pixel(
            px,
            py,
            Rgba([mix(fg[0], bg[0]), mix(fg[1], bg[1]), mix(fg[2], bg[2]), 255]),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn tree_of(html: &str) -> (StyledTree, NodeIndex) {
        let tree = StyledTree::from_html(&Html::parse_document(html));
        let root = tree.find_by_id("r").unwrap();
        (tree, root)
    }

    #[test]
    fn output_is_scaled_by_pixel_ratio() {
        let (tree, root) = tree_of(r#"<div id="r"><p>Hello</p></div>"#);
        let opts = RasterOptions { viewport: Viewport { width: 100 }, ..Default::default() };
        let img = SoftwareRasterizer::without_font().rasterize(&tree, root, &opts).unwrap();
        let layout = layout_tree(&tree, root, 100);
        assert_eq!(img.width(), 200);
        assert_eq!(img.height(), layout.height * 2);
    }

    #[test]
    fn paints_background_and_text_over_white() {
        let (tree, root) = tree_of(
            r#"<div id="r"><div style="background-color: rgb(16, 185, 129)">x</div><p>Hello world</p></div>"#,
        );
        let img = SoftwareRasterizer::without_font()
            .rasterize(&tree, root, &RasterOptions::default())
            .unwrap();
        let px = img.pixels();
        assert_eq!(*px.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert!(px.pixels().any(|p| *p == Rgba([16, 185, 129, 255])));
        assert!(px.pixels().any(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn rejects_bad_ratio_and_oversized_capture() {
        let (tree, root) = tree_of(r#"<div id="r"><p>Hi</p></div>"#);
        let r = SoftwareRasterizer::without_font();
        let bad = RasterOptions { pixel_ratio: 0.0, ..Default::default() };
        assert!(matches!(r.rasterize(&tree, root, &bad), Err(Error::RenderError(_))));
        let huge = RasterOptions { viewport: Viewport { width: MAX_RASTER_DIMENSION }, ..Default::default() };
        assert!(matches!(r.rasterize(&tree, root, &huge), Err(Error::RenderError(_))));
    }

    #[test]
    fn missing_font_file_is_an_io_error() {
        let err = SoftwareRasterizer::with_font_file(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
