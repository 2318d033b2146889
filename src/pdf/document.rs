use lopdf::{dictionary, Document, Object, Stream};
use std::collections::{BTreeMap, BTreeSet};

use super::content::{compress_data, ContentBuilder};
use super::fonts::{embed_cid_font, encode_glyph_ids, GlyphUsage};
use super::images::add_image_xobject;
use super::resources::{font_resource_name, image_resource_name, page_resources_dictionary, PageResources};
use crate::config::PageSection;
use crate::error::SheetError;
use crate::layout::{DrawOp, FontStyle, ImageSlot};

/// Emit a display list as a single-page PDF.
///
/// The output depends only on the inputs: no creation dates or document
/// ids are written, so rendering the same page twice gives the same bytes.
pub fn write_page(ops: &[DrawOp], page: &PageSection, resources: &PageResources) -> Result<Vec<u8>, SheetError> {
    let page_width = page.width.as_points();
    let page_height = page.height.as_points();

    let mut builder = ContentBuilder::new(page_height);
    let mut used_glyphs: BTreeMap<FontStyle, GlyphUsage> = BTreeMap::new();
    let mut used_images: BTreeSet<ImageSlot> = BTreeSet::new();

    for op in ops {
        match op {
            DrawOp::LineWidth(width) => builder.line_width(*width),
            DrawOp::Line { x1, y1, x2, y2 } => builder.line(*x1, *y1, *x2, *y2),
            DrawOp::FillRect { x, y, w, h, rgb } => builder.fill_rect(*x, *y, *w, *h, *rgb),
            DrawOp::Image { slot, x, y, w, h } => {
                if resources.image(*slot).is_none() {
                    return Err(SheetError::Render(format!("no image loaded for the {:?} slot", slot)));
                }
                used_images.insert(*slot);
                builder.image(image_resource_name(*slot), *x, *y, *w, *h);
            }
            DrawOp::Text { style, size, x, y, text } => {
                let font = resources
                    .font(*style)
                    .ok_or_else(|| SheetError::Render(format!("no {:?} font loaded to draw {:?}", style, text)))?;
                let glyphs = font.glyphs(text);
                let usage = used_glyphs.entry(*style).or_default();
                for glyph in &glyphs {
                    usage.insert(glyph.id, *glyph);
                }
                builder.text(font_resource_name(*style), *size, *x, *y, &encode_glyph_ids(&glyphs));
            }
        }
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font_ids = Vec::new();
    for (style, usage) in &used_glyphs {
        // Presence was checked while building the content stream.
        let Some(font) = resources.font(*style) else { continue };
        let id = embed_cid_font(&mut doc, font, usage)?;
        font_ids.push((font_resource_name(*style), id));
    }

    let mut xobject_ids = Vec::new();
    for slot in &used_images {
        let Some(image) = resources.image(*slot) else { continue };
        xobject_ids.push((image_resource_name(*slot), add_image_xobject(&mut doc, image)));
    }

    let content = compress_data(&builder.build_content_bytes()).map_err(|e| SheetError::Render(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! { "Filter" => "FlateDecode" }, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page_width as _),
            Object::Real(page_height as _),
        ],
        "Resources" => page_resources_dictionary(&font_ids, &xobject_ids),
        "Contents" => content_id,
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1_i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| SheetError::Render(format!("Failed to serialize PDF: {}", e)))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::images::tests::write_png;
    use crate::pdf::images::ImageAsset;

    fn grid_ops() -> Vec<DrawOp> {
        vec![
            DrawOp::Image { slot: ImageSlot::Header, x: 25.0, y: 15.0, w: 545.0, h: 130.0 },
            DrawOp::LineWidth(0.5),
            DrawOp::FillRect { x: 25.0, y: 160.0, w: 545.0, h: 24.5, rgb: [220, 220, 220] },
            DrawOp::Line { x1: 25.0, y1: 160.0, x2: 570.0, y2: 160.0 },
            DrawOp::Line { x1: 25.0, y1: 160.0, x2: 25.0, y2: 797.0 },
        ]
    }

    #[test]
    fn test_write_page_produces_single_page_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header.png");
        write_png(&path, false);
        let header = ImageAsset::load(&path).unwrap();
        let resources = PageResources::new().with_image(ImageSlot::Header, &header);

        let bytes = write_page(&grid_ops(), &PageSection::default(), &resources).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = *pages.values().next().unwrap();
        let content = doc.get_page_content(page_id).unwrap();
        let content = String::from_utf8(content).unwrap();
        assert!(content.contains("/Im2 Do"));
        assert!(content.contains("0.5 w"));
    }

    #[test]
    fn test_write_page_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header.png");
        write_png(&path, true);
        let header = ImageAsset::load(&path).unwrap();
        let resources = PageResources::new().with_image(ImageSlot::Header, &header);

        let first = write_page(&grid_ops(), &PageSection::default(), &resources).unwrap();
        let second = write_page(&grid_ops(), &PageSection::default(), &resources).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_text_without_font_is_render_error() {
        let ops = vec![DrawOp::Text {
            style: FontStyle::Bold,
            size: 11.5,
            x: 30.0,
            y: 175.0,
            text: "No".to_string(),
        }];
        let result = write_page(&ops, &PageSection::default(), &PageResources::new());
        assert!(matches!(result, Err(SheetError::Render(_))));
    }

    #[test]
    fn test_image_without_asset_is_render_error() {
        let result = write_page(&grid_ops(), &PageSection::default(), &PageResources::new());
        assert!(matches!(result, Err(SheetError::Render(_))));
    }

    #[test]
    fn test_unused_images_are_not_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("footer.png");
        write_png(&path, false);
        let footer = ImageAsset::load(&path).unwrap();
        let resources = PageResources::new().with_image(ImageSlot::Footer, &footer);

        let ops = vec![DrawOp::Line { x1: 0.0, y1: 0.0, x2: 10.0, y2: 10.0 }];
        let bytes = write_page(&ops, &PageSection::default(), &resources).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let page_resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(page_resources.get(b"XObject").is_err());
    }
}
