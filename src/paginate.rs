//! Pagination of a single tall raster across fixed-size pages.
//!
//! The raster is scaled to fill the page content width, keeping its aspect
//! ratio. Every page draws the *whole* scaled image, shifted further up each
//! time, and the page content area acts as the clip window. Page `k` therefore
//! shows the band `[k * content_height, (k + 1) * content_height)` of the
//! scaled image.
//!
//! All lengths here are millimetres.

use crate::{Error, Result};

/// Slack, in pages, when deciding whether the image fills a whole number of pages
const PAGE_FIT_TOLERANCE: f64 = 1e-9;

/// Page size and uniform margin, in millimetres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl PageGeometry {
    /// ISO A4 portrait with 10 mm margins
    pub const A4_PORTRAIT: PageGeometry = PageGeometry { width: 210.0, height: 297.0, margin: 10.0 };

    pub fn content_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    pub fn content_height(&self) -> f64 {
        self.height - 2.0 * self.margin
    }

    pub fn validate(&self) -> Result<()> {
        let finite = self.width.is_finite() && self.height.is_finite() && self.margin.is_finite();
        if !finite || self.margin < 0.0 || self.content_width() <= 0.0 || self.content_height() <= 0.0 {
            return Err(Error::ConfigError(format!(
                "page {}x{} mm with {} mm margins leaves no content area",
                self.width, self.height, self.margin
            )));
        }
        Ok(())
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::A4_PORTRAIT
    }
}

/// Placement of the scaled image on one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSlice {
    /// 0-based page number
    pub index: usize,
    /// Distance from the page top to the image top; negative once the image
    /// has been scrolled past the first page
    pub offset: f64,
    /// How much of the scaled image earlier pages already showed
    pub source_offset: f64,
    /// Height of the band this page actually shows
    pub visible_height: f64,
}

/// Page plan for one raster on one page geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pagination {
    geometry: PageGeometry,
    scaled_height: f64,
}

impl Pagination {
    pub fn new(pixel_width: u32, pixel_height: u32, geometry: PageGeometry) -> Result<Self> {
        geometry.validate()?;
        if pixel_width == 0 || pixel_height == 0 {
            return Err(Error::DocumentError(format!(
                "cannot paginate an empty {}x{} raster",
                pixel_width, pixel_height
            )));
        }
        let scaled_height = geometry.content_width() * (pixel_height as f64 / pixel_width as f64);
        Ok(Self { geometry, scaled_height })
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    /// Width the image is drawn at (the page content width)
    pub fn image_width(&self) -> f64 {
        self.geometry.content_width()
    }

    /// Total image height once fitted to the content width
    pub fn scaled_height(&self) -> f64 {
        self.scaled_height
    }

    /// `ceil(scaled_height / content_height)`, at least 1.
    ///
    /// A quotient within rounding noise of a whole number counts as that
    /// number, so an exact fit never grows an empty trailing page.
    pub fn page_count(&self) -> usize {
        let pages = self.scaled_height / self.geometry.content_height();
        let whole = pages.round();
        let pages = if (pages - whole).abs() <= PAGE_FIT_TOLERANCE {
            whole
        } else {
            pages.ceil()
        };
        (pages as usize).max(1)
    }

    /// Lazily generate one slice per page
    pub fn slices(&self) -> PageSlices {
        PageSlices {
            margin: self.geometry.margin,
            page_content: self.geometry.content_height(),
            scaled_height: self.scaled_height,
            pages: self.page_count(),
            index: 0,
        }
    }
}

/// Iterator over the pages of a `Pagination`
#[derive(Debug, Clone)]
pub struct PageSlices {
    margin: f64,
    page_content: f64,
    scaled_height: f64,
    pages: usize,
    index: usize,
}

impl Iterator for PageSlices {
    type Item = PageSlice;

    fn next(&mut self) -> Option<PageSlice> {
        if self.index >= self.pages {
            return None;
        }
        let consumed = self.index as f64 * self.page_content;
        let visible_height = if self.index + 1 == self.pages {
            self.scaled_height - consumed
        } else {
            self.page_content
        };
        let slice = PageSlice {
            index: self.index,
            offset: self.margin - consumed,
            source_offset: consumed,
            visible_height,
        };
        self.index += 1;
        Some(slice)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.pages - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for PageSlices {}

/// Replace characters that cannot appear in a file name component
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// `<prefix>_<label>.pdf`, using `fallback` when the label is absent or blank
pub fn report_file_name(prefix: &str, label: Option<&str>, fallback: &str) -> String {
    let label = label.map(str::trim).filter(|l| !l.is_empty()).unwrap_or(fallback);
    format!("{}_{}.pdf", prefix, sanitize_label(label))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a4() -> PageGeometry {
        PageGeometry::A4_PORTRAIT
    }

    #[test]
    fn tall_capture_spans_three_pages() {
        let p = Pagination::new(1000, 3000, a4()).unwrap();
        assert_eq!(p.scaled_height(), 570.0);
        assert_eq!(p.page_count(), 3);
        let offsets: Vec<f64> = p.slices().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![10.0, 10.0 - 277.0, 10.0 - 554.0]);
    }

    #[test]
    fn short_capture_fits_one_page() {
        let p = Pagination::new(1000, 500, a4()).unwrap();
        assert_eq!(p.scaled_height(), 95.0);
        let slices: Vec<_> = p.slices().collect();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].offset, 10.0);
        assert_eq!(slices[0].visible_height, 95.0);
    }

    #[test]
    fn exact_multiple_does_not_add_blank_page() {
        let square = PageGeometry { width: 120.0, height: 120.0, margin: 10.0 };
        let p = Pagination::new(100, 200, square).unwrap();
        assert_eq!(p.scaled_height(), 200.0);
        assert_eq!(p.page_count(), 2);
        let last = p.slices().last().unwrap();
        assert_eq!(last.visible_height, 100.0);
    }

    #[test]
    fn bands_tile_the_scaled_image() {
        for (w, h) in [(1000u32, 3000u32), (800, 4321), (640, 100), (333, 2000)] {
            let p = Pagination::new(w, h, a4()).unwrap();
            let slices: Vec<_> = p.slices().collect();
            assert_eq!(slices[0].source_offset, 0.0);
            assert_eq!(slices[0].offset, a4().margin);
            let mut expected_start = 0.0;
            for s in &slices {
                assert!((s.source_offset - expected_start).abs() < 1e-9);
                assert!(s.visible_height > 0.0);
                expected_start += s.visible_height;
            }
            assert!((expected_start - p.scaled_height()).abs() < 1e-9);
            let expected_pages = (p.scaled_height() / a4().content_height()).ceil().max(1.0) as usize;
            assert_eq!(slices.len(), expected_pages);
        }
    }

    #[test]
    fn fractional_margins_never_add_an_empty_page() {
        let g = PageGeometry { width: 210.0, height: 297.0, margin: 0.6000000000000001 };
        let p = Pagination::new(100, 425, g).unwrap();
        assert_eq!(p.page_count(), 3);
        let last = p.slices().last().unwrap();
        assert!((last.visible_height - g.content_height()).abs() < 1e-9);

        for tenths in 3..=62 {
            let g = PageGeometry { margin: tenths as f64 * 0.1, ..PageGeometry::A4_PORTRAIT };
            for w in [100u32, 333] {
                for h in 1..=1500u32 {
                    let p = Pagination::new(w, h, g).unwrap();
                    let slices: Vec<_> = p.slices().collect();
                    assert_eq!(slices.len(), p.page_count());
                    let expected = ((p.scaled_height() / g.content_height()) - 1e-9).ceil().max(1.0) as usize;
                    assert_eq!(slices.len(), expected, "margin {} size {}x{}", g.margin, w, h);
                    for s in &slices {
                        assert!(s.visible_height > 1e-6, "empty page at margin {} size {}x{}", g.margin, w, h);
                    }
                    let total: f64 = slices.iter().map(|s| s.visible_height).sum();
                    assert!((total - p.scaled_height()).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn rejects_empty_raster_and_degenerate_page() {
        assert!(matches!(Pagination::new(0, 10, a4()), Err(Error::DocumentError(_))));
        let no_room = PageGeometry { width: 20.0, height: 297.0, margin: 10.0 };
        assert!(matches!(Pagination::new(10, 10, no_room), Err(Error::ConfigError(_))));
    }

    #[test]
    fn file_name_uses_label_or_fallback() {
        assert_eq!(
            report_file_name("agripredict_report", Some("Pune"), "custom"),
            "agripredict_report_Pune.pdf"
        );
        assert_eq!(report_file_name("r", Some("  "), "custom"), "r_custom.pdf");
        assert_eq!(report_file_name("r", None, "custom"), "r_custom.pdf");
        assert_eq!(report_file_name("r", Some("a/b"), "custom"), "r_a_b.pdf");
    }
}
