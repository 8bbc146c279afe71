//! PDF assembly for an exported capture.
//!
//! The raster is embedded once as a Flate-compressed RGB image XObject and
//! every page paints that same XObject at its slice offset, clipped to the
//! page content area.

use crate::paginate::{PageGeometry, PageSlice, Pagination};
use crate::rendering::RasterImage;
use crate::{Error, Result};
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, TextStr};

/// PostScript points per millimetre
pub const PT_PER_MM: f64 = 72.0 / 25.4;

const IMAGE_NAME: Name<'static> = Name(b"Im1");

fn pt(mm: f64) -> f32 {
    (mm * PT_PER_MM) as f32
}

/// A paginated capture ready to be written out
#[derive(Debug, Clone)]
pub struct ExportDocument {
    file_name: String,
    pagination: Pagination,
    pages: Vec<PageSlice>,
    image: RasterImage,
}

impl ExportDocument {
    pub fn new(file_name: impl Into<String>, image: RasterImage, geometry: PageGeometry) -> Result<Self> {
        let pagination = Pagination::new(image.width(), image.height(), geometry)?;
        let pages = pagination.slices().collect();
        Ok(Self { file_name: file_name.into(), pagination, pages, image })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn pages(&self) -> &[PageSlice] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn image(&self) -> &RasterImage {
        &self.image
    }

    /// Image placement matrix for each page, in PDF user space (origin at the
    /// bottom-left corner, units in points).
    pub fn placements(&self) -> Vec<[f32; 6]> {
        let g = self.pagination.geometry();
        let image_w = self.pagination.image_width();
        let image_h = self.pagination.scaled_height();
        self.pages
            .iter()
            .map(|slice| {
                let bottom = g.height - (slice.offset + image_h);
                [pt(image_w), 0.0, 0.0, pt(image_h), pt(g.margin), pt(bottom)]
            })
            .collect()
    }

    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(Error::DocumentError("document has no pages".into()));
        }
        let pixel_w = i32::try_from(self.image.width())
            .map_err(|_| Error::DocumentError("image too wide for PDF".into()))?;
        let pixel_h = i32::try_from(self.image.height())
            .map_err(|_| Error::DocumentError("image too tall for PDF".into()))?;
        let page_count = i32::try_from(self.pages.len())
            .map_err(|_| Error::DocumentError("too many pages".into()))?;

        let mut next_id = 1;
        let mut alloc = || {
            let r = Ref::new(next_id);
            next_id += 1;
            r
        };
        let catalog_id = alloc();
        let tree_id = alloc();
        let info_id = alloc();
        let image_id = alloc();
        let page_ids: Vec<Ref> = self.pages.iter().map(|_| alloc()).collect();
        let content_ids: Vec<Ref> = self.pages.iter().map(|_| alloc()).collect();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(tree_id);
        pdf.pages(tree_id).kids(page_ids.iter().copied()).count(page_count);
        pdf.document_info(info_id)
            .title(TextStr(self.file_name.trim_end_matches(".pdf")))
            .producer(TextStr("agrireport"));

        let samples = miniz_oxide::deflate::compress_to_vec_zlib(&self.image.to_rgb_bytes(), 6);
        {
            let mut xobj = pdf.image_xobject(image_id, &samples);
            xobj.filter(Filter::FlateDecode);
            xobj.width(pixel_w);
            xobj.height(pixel_h);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
        }

        let g = self.pagination.geometry();
        let media = Rect::new(0.0, 0.0, pt(g.width), pt(g.height));
        for ((&page_id, &content_id), matrix) in page_ids.iter().zip(&content_ids).zip(self.placements()) {
            let mut content = Content::new();
            content.save_state();
            content.rect(pt(g.margin), pt(g.margin), pt(g.content_width()), pt(g.content_height()));
            content.clip_nonzero();
            content.end_path();
            content.transform(matrix);
            content.x_object(IMAGE_NAME);
            content.restore_state();
            pdf.stream(content_id, &content.finish());

            let mut page = pdf.page(page_id);
            page.media_box(media);
            page.parent(tree_id);
            page.contents(content_id);
            page.resources().x_objects().pair(IMAGE_NAME, image_id);
        }

        log::debug!(
            "assembled {} ({} pages, {}x{} px image)",
            self.file_name,
            self.pages.len(),
            pixel_w,
            pixel_h
        );
        Ok(pdf.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn doc(w: u32, h: u32) -> ExportDocument {
        let image = RasterImage::new(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])));
        ExportDocument::new("agripredict_report_custom.pdf", image, PageGeometry::A4_PORTRAIT).unwrap()
    }

    #[test]
    fn writes_one_pdf_page_per_slice() {
        let d = doc(100, 300);
        assert_eq!(d.page_count(), 3);
        let bytes = d.to_pdf_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Count 3"));
        let pages = text.matches("/Type /Page").count() - text.matches("/Type /Pages").count();
        assert_eq!(pages, 3);
        assert_eq!(text.matches("/Subtype /Image").count(), 1);
    }

    #[test]
    fn placements_scroll_the_image_up_by_one_content_height() {
        let d = doc(100, 300);
        let m = d.placements();
        let step = pt(PageGeometry::A4_PORTRAIT.content_height());
        assert_eq!(m.len(), 3);
        for pair in m.windows(2) {
            assert!((pair[1][5] - pair[0][5] - step).abs() < 1e-2);
            assert_eq!(pair[0][4], pair[1][4]);
        }
        // First page: image top sits on the top margin.
        let top = m[0][5] + m[0][3];
        assert!((top - pt(297.0 - 10.0)).abs() < 1e-2);
    }
}
