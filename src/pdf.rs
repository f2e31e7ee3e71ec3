//! Assemble page images into a PDF.
//!
//! One page per image, in input order. Each image is drawn from the top-left
//! corner and scaled to the full page width at its own aspect ratio.

use crate::normalize::NormalizedImage;
use crate::{Error, Result};
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, TextStr};

/// A4 portrait in points
pub const A4_WIDTH_PT: f32 = 595.28;
pub const A4_HEIGHT_PT: f32 = 841.89;

/// How page boxes are sized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    /// Fixed A4 pages; content taller than the page is clipped
    #[default]
    A4,
    /// A4-wide pages whose height follows each image's aspect ratio
    FitImage,
}

/// Placement of one image on its page, in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub page_width: f32,
    pub page_height: f32,
    pub image_width: f32,
    pub image_height: f32,
}

impl PageSize {
    pub fn place(&self, width_px: u32, height_px: u32) -> Placement {
        let image_width = A4_WIDTH_PT;
        let image_height = height_px as f32 / width_px as f32 * image_width;
        let page_height = match self {
            PageSize::A4 => A4_HEIGHT_PT,
            PageSize::FitImage => image_height,
        };
        Placement {
            page_width: A4_WIDTH_PT,
            page_height,
            image_width,
            image_height,
        }
    }
}

/// Build a PDF from `images`. An empty list yields a single blank page.
pub fn assemble(images: &[NormalizedImage], size: PageSize, title: Option<&str>) -> Result<Vec<u8>> {
    if let Some(bad) = images.iter().position(|i| i.width == 0 || i.height == 0) {
        return Err(Error::PdfError(format!("image {} has zero size", bad + 1)));
    }

    let mut next_id = 1;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let mut pdf = Pdf::new();
    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();

    let page_count = images.len().max(1);
    let page_ids: Vec<Ref> = (0..page_count).map(|_| alloc()).collect();

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(page_count as i32);

    if let Some(t) = title.filter(|t| !t.is_empty()) {
        pdf.document_info(info_id).title(TextStr(t));
    }

    if images.is_empty() {
        pdf.page(page_ids[0])
            .media_box(Rect::new(0.0, 0.0, A4_WIDTH_PT, A4_HEIGHT_PT))
            .parent(pages_id);
        return Ok(pdf.finish());
    }

    for (img, page_id) in images.iter().zip(&page_ids) {
        let image_id = alloc();
        let content_id = alloc();
        let name = Name(b"Im1");
        let p = size.place(img.width, img.height);

        {
            let mut xobj = pdf.image_xobject(image_id, &img.jpeg);
            xobj.filter(Filter::DctDecode);
            xobj.width(img.width as i32);
            xobj.height(img.height as i32);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
        }

        let mut content = Content::new();
        content.save_state();
        content.transform([
            p.image_width,
            0.0,
            0.0,
            p.image_height,
            0.0,
            p.page_height - p.image_height,
        ]);
        content.x_object(name);
        content.restore_state();
        pdf.stream(content_id, &content.finish());

        let mut page = pdf.page(*page_id);
        page.media_box(Rect::new(0.0, 0.0, p.page_width, p.page_height))
            .parent(pages_id)
            .contents(content_id);
        page.resources().x_objects().pair(name, image_id);
    }

    Ok(pdf.finish())
}
