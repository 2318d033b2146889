use lopdf::{Dictionary, Object, ObjectId};
use std::collections::BTreeMap;

use super::fonts::LoadedFont;
use super::images::ImageAsset;
use crate::layout::{FontStyle, ImageSlot};

/// Fonts and images a page may draw with. Pages only embed what their
/// display list actually uses.
#[derive(Default)]
pub struct PageResources<'a> {
    fonts: BTreeMap<FontStyle, &'a LoadedFont>,
    images: BTreeMap<ImageSlot, &'a ImageAsset>,
}

impl<'a> PageResources<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font(mut self, style: FontStyle, font: &'a LoadedFont) -> Self {
        self.fonts.insert(style, font);
        self
    }

    pub fn with_image(mut self, slot: ImageSlot, image: &'a ImageAsset) -> Self {
        self.images.insert(slot, image);
        self
    }

    pub fn font(&self, style: FontStyle) -> Option<&'a LoadedFont> {
        self.fonts.get(&style).copied()
    }

    pub fn image(&self, slot: ImageSlot) -> Option<&'a ImageAsset> {
        self.images.get(&slot).copied()
    }
}

/// Resource name used for a font in content streams.
pub fn font_resource_name(style: FontStyle) -> &'static str {
    match style {
        FontStyle::Regular => "F1",
        FontStyle::Bold => "F2",
    }
}

/// Resource name used for an image XObject in content streams.
pub fn image_resource_name(slot: ImageSlot) -> &'static str {
    match slot {
        ImageSlot::Background => "Im1",
        ImageSlot::Header => "Im2",
        ImageSlot::Footer => "Im3",
    }
}

/// Build a page's Resources dictionary from embedded font and XObject ids.
pub fn page_resources_dictionary(fonts: &[(&str, ObjectId)], xobjects: &[(&str, ObjectId)]) -> Dictionary {
    let mut resources = Dictionary::new();

    if !fonts.is_empty() {
        let mut font_resources = Dictionary::new();
        for (name, id) in fonts {
            font_resources.set(name.as_bytes().to_vec(), Object::Reference(*id));
        }
        resources.set("Font", Object::Dictionary(font_resources));
    }

    if !xobjects.is_empty() {
        let mut xobject_resources = Dictionary::new();
        for (name, id) in xobjects {
            xobject_resources.set(name.as_bytes().to_vec(), Object::Reference(*id));
        }
        resources.set("XObject", Object::Dictionary(xobject_resources));
    }

    resources
}
