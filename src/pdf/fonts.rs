use fontdb::{Database, Family, Query, Source, Weight};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use ttf_parser::{Face, GlyphId};

use super::content::compress_data;
use crate::config::FontSpec;
use crate::error::SheetError;
use crate::layout::{FontStyle, TextMeasure};

/// A glyph placed on the page, with the character it was mapped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub id: u16,
    pub ch: char,
    pub advance: u16,
}

/// Glyphs used on a page, keyed by glyph id.
pub type GlyphUsage = BTreeMap<u16, Glyph>;

/// A TrueType font loaded once per run. The font program is compressed up
/// front since every page embeds it.
pub struct LoadedFont {
    name: String,
    data: Vec<u8>,
    compressed_program: Vec<u8>,
    face_index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    bbox: [i16; 4],
    glyph_cache: RefCell<BTreeMap<char, Glyph>>,
}

impl LoadedFont {
    /// Parse raw font data. `fallback_name` is used when the font carries
    /// no PostScript name.
    pub fn from_bytes(data: Vec<u8>, face_index: u32, fallback_name: &str) -> Result<Self, String> {
        let face = Face::parse(&data, face_index).map_err(|e| format!("Failed to parse font: {}", e))?;

        let name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .unwrap_or_else(|| fallback_name.to_string());
        let bbox = face.global_bounding_box();
        let units_per_em = face.units_per_em();
        let ascender = face.ascender();
        let descender = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascender);
        let bbox = [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max];

        let compressed_program = compress_data(&data).map_err(|e| format!("Failed to compress font: {}", e))?;

        Ok(Self {
            // PDF names cannot contain spaces.
            name: name.replace(' ', "-"),
            data,
            compressed_program,
            face_index,
            units_per_em,
            ascender,
            descender,
            cap_height,
            bbox,
            glyph_cache: RefCell::new(BTreeMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Map text to glyphs. Characters missing from the font map to glyph 0
    /// (.notdef). Lookups are cached, so the face is only parsed for
    /// characters not seen before and a missing glyph is reported once.
    pub fn glyphs(&self, text: &str) -> Vec<Glyph> {
        let mut cache = self.glyph_cache.borrow_mut();
        if text.chars().any(|ch| !cache.contains_key(&ch)) {
            let Ok(face) = Face::parse(&self.data, self.face_index) else {
                return Vec::new();
            };
            for ch in text.chars() {
                cache.entry(ch).or_insert_with(|| {
                    let id = face.glyph_index(ch).unwrap_or_else(|| {
                        log::warn!("Font {} has no glyph for {:?}", self.name, ch);
                        GlyphId(0)
                    });
                    let advance = face.glyph_hor_advance(id).unwrap_or(0);
                    Glyph { id: id.0, ch, advance }
                });
            }
        }
        text.chars().filter_map(|ch| cache.get(&ch).copied()).collect()
    }

    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        let units: u32 = self.glyphs(text).iter().map(|g| u32::from(g.advance)).sum();
        f64::from(units) * size / f64::from(self.units_per_em)
    }

    /// Glyph advance in PDF text space (thousandths of an em).
    fn pdf_width(&self, advance: u16) -> i64 {
        (f64::from(advance) * 1000.0 / f64::from(self.units_per_em)).round() as i64
    }

    fn scaled(&self, value: i16) -> i64 {
        (f64::from(value) * 1000.0 / f64::from(self.units_per_em)).round() as i64
    }
}

/// Read a font from `spec`: an explicit file (relative to `base_dir`) or a
/// family looked up in the system font database.
fn load_font(spec: &FontSpec, bold: bool, base_dir: &Path, db: &mut Option<Database>) -> Result<LoadedFont, SheetError> {
    if let Some(file) = &spec.file {
        let path = base_dir.join(file);
        let data = fs::read(&path).map_err(|e| SheetError::asset(&path, e))?;
        let fallback = path.file_stem().and_then(|s| s.to_str()).unwrap_or("Font");
        return LoadedFont::from_bytes(data, 0, fallback).map_err(|e| SheetError::asset(&path, e));
    }

    let family = spec.family.as_deref().unwrap_or("DejaVu Sans");
    let db = db.get_or_insert_with(|| {
        let mut db = Database::new();
        db.load_system_fonts();
        db
    });
    let (data, index) = find_system_font(db, family, bold)
        .ok_or_else(|| SheetError::asset(family, "no matching font installed"))?;
    LoadedFont::from_bytes(data, index, family).map_err(|e| SheetError::asset(family, e))
}

/// Find a font face in the system database by family name and weight.
fn find_system_font(db: &Database, family: &str, bold: bool) -> Option<(Vec<u8>, u32)> {
    let families = [Family::Name(family)];
    let query = Query {
        families: &families,
        weight: if bold { Weight::BOLD } else { Weight::NORMAL },
        ..Default::default()
    };
    let id = db.query(&query)?;
    let (source, index) = db.face_source(id)?;
    match source {
        Source::File(path) => fs::read(&path).ok().map(|data| (data, index)),
        Source::Binary(data) => Some((data.as_ref().as_ref().to_vec(), index)),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

/// The two faces every sheet uses.
pub struct FontSet {
    pub regular: LoadedFont,
    pub bold: LoadedFont,
}

impl FontSet {
    pub fn load(regular: &FontSpec, bold: &FontSpec, base_dir: &Path) -> Result<Self, SheetError> {
        let mut db = None;
        Ok(Self {
            regular: load_font(regular, false, base_dir, &mut db)?,
            bold: load_font(bold, true, base_dir, &mut db)?,
        })
    }

    pub fn get(&self, style: FontStyle) -> &LoadedFont {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
        }
    }
}

impl TextMeasure for FontSet {
    fn text_width(&self, style: FontStyle, text: &str, size: f64) -> f64 {
        self.get(style).text_width(text, size)
    }

    fn vertical_metrics(&self, style: FontStyle) -> (f64, f64) {
        let font = self.get(style);
        let em = f64::from(font.units_per_em);
        (f64::from(font.ascender) / em, f64::from(font.descender) / em)
    }
}

/// Text for glyph ids in an Identity-H content stream.
pub fn encode_glyph_ids(glyphs: &[Glyph]) -> String {
    glyphs.iter().map(|g| format!("{:04X}", g.id)).collect()
}

/// ToUnicode CMap so text copied out of the sheet reads as characters.
fn to_unicode_cmap(used: &GlyphUsage) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    let glyphs: Vec<&Glyph> = used.values().collect();
    // A bfchar block holds at most 100 entries.
    for block in glyphs.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for glyph in block {
            let mut units = [0u16; 2];
            let utf16: String = glyph
                .ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{:04X}", u))
                .collect();
            cmap.push_str(&format!("<{:04X}> <{}>\n", glyph.id, utf16));
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}

/// Embed a Type0 font with a CIDFontType2 descendant. Glyph ids are used
/// directly as CIDs, and widths are written for the glyphs actually used.
pub fn embed_cid_font(doc: &mut Document, font: &LoadedFont, used: &GlyphUsage) -> Result<ObjectId, SheetError> {
    let mut font_stream_dict = Dictionary::new();
    font_stream_dict.set("Length1", font.data.len() as i64);
    font_stream_dict.set("Filter", "FlateDecode");
    let font_stream_id = doc.add_object(Stream::new(font_stream_dict, font.compressed_program.clone()));

    let mut font_descriptor = Dictionary::new();
    font_descriptor.set("Type", "FontDescriptor");
    font_descriptor.set("FontName", Object::Name(font.name.as_bytes().to_vec()));
    font_descriptor.set("Flags", 32i64); // Nonsymbolic
    font_descriptor.set(
        "FontBBox",
        font.bbox.iter().map(|v| Object::Integer(font.scaled(*v))).collect::<Vec<_>>(),
    );
    font_descriptor.set("ItalicAngle", 0i64);
    font_descriptor.set("Ascent", font.scaled(font.ascender));
    font_descriptor.set("Descent", font.scaled(font.descender));
    font_descriptor.set("CapHeight", font.scaled(font.cap_height));
    font_descriptor.set("StemV", 80i64);
    font_descriptor.set("FontFile2", Object::Reference(font_stream_id));
    let descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));

    let mut widths = Vec::with_capacity(used.len() * 2);
    for glyph in used.values() {
        widths.push(Object::Integer(i64::from(glyph.id)));
        widths.push(Object::Array(vec![Object::Integer(font.pdf_width(glyph.advance))]));
    }

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", "Font");
    cid_font.set("Subtype", "CIDFontType2");
    cid_font.set("BaseFont", Object::Name(font.name.as_bytes().to_vec()));
    cid_font.set("CIDSystemInfo", {
        let mut cid_system = Dictionary::new();
        cid_system.set("Registry", Object::String("Adobe".into(), StringFormat::Literal));
        cid_system.set("Ordering", Object::String("Identity".into(), StringFormat::Literal));
        cid_system.set("Supplement", 0i64);
        Object::Dictionary(cid_system)
    });
    cid_font.set("CIDToGIDMap", "Identity");
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
    cid_font.set("W", widths);
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let cmap = to_unicode_cmap(used);
    let mut cmap_dict = Dictionary::new();
    cmap_dict.set("Filter", "FlateDecode");
    let compressed_cmap = compress_data(cmap.as_bytes()).map_err(|e| SheetError::Render(e.to_string()))?;
    let cmap_id = doc.add_object(Stream::new(cmap_dict, compressed_cmap));

    let mut type0_font = Dictionary::new();
    type0_font.set("Type", "Font");
    type0_font.set("Subtype", "Type0");
    type0_font.set("BaseFont", Object::Name(font.name.as_bytes().to_vec()));
    type0_font.set("Encoding", "Identity-H");
    type0_font.set("DescendantFonts", vec![Object::Reference(cid_font_id)]);
    type0_font.set("ToUnicode", Object::Reference(cmap_id));

    Ok(doc.add_object(Object::Dictionary(type0_font)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// The stock fonts from the system font database, or `None` when they
    /// are not installed.
    pub(crate) fn system_font_set() -> Option<FontSet> {
        let spec = FontSpec {
            file: None,
            family: Some("DejaVu Sans".to_string()),
        };
        match FontSet::load(&spec, &spec, Path::new(".")) {
            Ok(fonts) => Some(fonts),
            Err(e) => {
                eprintln!("skipping: {}", e);
                None
            }
        }
    }

    fn glyph(id: u16, ch: char) -> Glyph {
        Glyph { id, ch, advance: 600 }
    }

    #[test]
    fn test_encode_glyph_ids() {
        assert_eq!(encode_glyph_ids(&[glyph(0x24, 'A'), glyph(0x1A2, 'é')]), "002401A2");
        assert_eq!(encode_glyph_ids(&[]), "");
    }

    #[test]
    fn test_to_unicode_cmap() {
        let mut used = GlyphUsage::new();
        used.insert(0x24, glyph(0x24, 'A'));
        used.insert(0x03, glyph(0x03, ' '));
        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("2 beginbfchar\n<0003> <0020>\n<0024> <0041>\nendbfchar"));
    }

    #[test]
    fn test_to_unicode_cmap_splits_blocks() {
        let used: GlyphUsage = (1..=150u16)
            .map(|id| (id, glyph(id, char::from_u32(0x40 + u32::from(id)).unwrap())))
            .collect();
        let cmap = to_unicode_cmap(&used);
        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
        assert_eq!(cmap.matches("endbfchar").count(), 2);
    }

    #[test]
    fn test_rejects_invalid_font_data() {
        assert!(LoadedFont::from_bytes(b"not a font".to_vec(), 0, "Broken").is_err());
    }

    #[test]
    fn test_missing_font_file_is_asset_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = FontSpec {
            file: Some("fonts/missing.ttf".into()),
            family: None,
        };
        let result = FontSet::load(&spec, &spec, dir.path());
        assert!(matches!(result, Err(SheetError::AssetLoad { .. })));
    }

    #[test]
    fn test_glyph_lookups_are_cached() {
        let Some(fonts) = system_font_set() else { return };
        let font = &fonts.regular;

        let first = font.glyphs("Kamal");
        assert_eq!(first.len(), 5);
        assert!(first.iter().all(|g| g.id != 0 && g.advance > 0));
        assert_eq!(first[1], first[3]);
        assert_eq!(font.glyph_cache.borrow().len(), 4);

        assert_eq!(font.glyphs("Kamal"), first);
        assert_eq!(font.glyph_cache.borrow().len(), 4);

        // Private use character: mapped to .notdef and cached like any other.
        let missing = font.glyphs("\u{10FFFD}");
        assert_eq!(missing[0].id, 0);
        assert_eq!(font.glyph_cache.borrow().len(), 5);
    }

    #[test]
    fn test_text_width_sums_advances() {
        let Some(fonts) = system_font_set() else { return };
        let font = &fonts.bold;
        let units: u32 = font.glyphs("No").iter().map(|g| u32::from(g.advance)).sum();
        let expected = f64::from(units) * 11.5 / f64::from(font.units_per_em);
        assert!((font.text_width("No", 11.5) - expected).abs() < 1e-9);
        assert!(fonts.text_width(FontStyle::Bold, "No", 11.5) > fonts.text_width(FontStyle::Bold, "N", 11.5));
    }
}
