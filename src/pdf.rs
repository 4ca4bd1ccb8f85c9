//! PDF serialization – embeds every placement's raster as an image XObject
//! using `printpdf` (v0.8 ops-based API).

use printpdf::*;

use crate::document::{Document, Placement};
use crate::error::SerializeError;
use crate::units::mm_to_pt;

/// Serialize a finalized document into PDF bytes.
///
/// Each placement is PNG-encoded (lossless) and drawn at its mm position;
/// page size comes from the document geometry and the PDF title from the
/// document title.
pub fn write_pdf(document: &Document) -> Result<Vec<u8>, SerializeError> {
    let geometry = document.geometry();
    let page_w = Mm(geometry.page_width_mm as f32);
    let page_h = Mm(geometry.page_height_mm as f32);
    let page_height_pt = mm_to_pt(geometry.page_height_mm);

    let mut doc = PdfDocument::new(document.title());
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let mut pages = Vec::with_capacity(document.page_count());

    for page in document.pages() {
        let mut ops = Vec::with_capacity(page.placements.len());
        for placement in &page.placements {
            let xobj_id = embed_image(&mut doc, placement, page.index, &mut warnings)?;
            ops.push(placement_op(xobj_id, placement, page_height_pt));
        }
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    for w in &warnings {
        log::debug!("printpdf: {w:?}");
    }
    log::debug!("serialized {} page(s), {} bytes", document.page_count(), bytes.len());
    Ok(bytes)
}

fn embed_image(
    doc: &mut PdfDocument,
    placement: &Placement,
    page: usize,
    warnings: &mut Vec<PdfWarnMsg>,
) -> Result<XObjectId, SerializeError> {
    let png = placement
        .image
        .encode_png()
        .map_err(|e| SerializeError::ImageEncode {
            page,
            message: e.to_string(),
        })?;
    let raw = RawImage::decode_from_bytes(&png, warnings)
        .map_err(|message| SerializeError::ImageEmbed { page, message })?;
    Ok(doc.add_image(&raw))
}

fn placement_op(id: XObjectId, placement: &Placement, page_height_pt: f32) -> Op {
    let width_pt = mm_to_pt(placement.width_mm);
    let height_pt = mm_to_pt(placement.height_mm);
    // PDF origin is bottom-left; placements are measured from the top.
    let bottom_pt = page_height_pt - mm_to_pt(placement.y_mm) - height_pt;

    // At dpi=72 printpdf maps 1 px to 1 pt, so scale = target_pt / px.
    let px_w = placement.image.width().max(1) as f32;
    let px_h = placement.image.height().max(1) as f32;

    Op::UseXobject {
        id,
        transform: XObjectTransform {
            translate_x: Some(Pt(mm_to_pt(placement.x_mm))),
            translate_y: Some(Pt(bottom_pt)),
            dpi: Some(72.0),
            scale_x: Some(width_pt / px_w),
            scale_y: Some(height_pt / px_h),
            rotate: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::BlockRole;
    use crate::pagination::{PageFlow, PageGeometry};
    use crate::raster::RasterImage;

    #[test]
    fn single_block_document_is_a_pdf() {
        let mut flow = PageFlow::new(PageGeometry::default(), "Test Book");
        flow.place_next(RasterImage::blank(68, 20), BlockRole::Cover, 0.0);
        let bytes = write_pdf(&flow.seal_and_finalize()).unwrap();
        assert!(bytes.len() > 100, "PDF should have content");
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn placement_is_flipped_to_pdf_space() {
        let placement = Placement {
            x_mm: 15.0,
            y_mm: 15.0,
            width_mm: 180.0,
            height_mm: 90.0,
            role: BlockRole::Cover,
            image: RasterImage::blank(680, 340),
        };
        let mut doc = PdfDocument::new("t");
        let id = embed_image(&mut doc, &placement, 0, &mut Vec::new()).unwrap();
        let op = placement_op(id, &placement, mm_to_pt(297.0));
        let Op::UseXobject { transform, .. } = op else {
            panic!("expected an image op");
        };
        let Some(Pt(y)) = transform.translate_y else {
            panic!("missing y");
        };
        // bottom edge at 297 - 15 - 90 = 192 mm
        assert!((y - mm_to_pt(192.0)).abs() < 0.01);
    }
}
