use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;

use super::content::compress_data;
use crate::error::SheetError;

/// A decoded raster image, compressed and ready to embed.
pub struct ImageAsset {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl ImageAsset {
    pub fn load(path: &Path) -> Result<Self, SheetError> {
        let img = image::open(path).map_err(|e| SheetError::asset(path, e))?;
        Self::from_image(&img).map_err(|e| SheetError::asset(path, e))
    }

    pub fn from_image(img: &DynamicImage) -> std::io::Result<Self> {
        let (width, height) = (img.width(), img.height());
        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            let mut rgb = Vec::with_capacity((width * height * 3) as usize);
            let mut alpha = Vec::with_capacity((width * height) as usize);
            for pixel in rgba.pixels() {
                rgb.extend_from_slice(&pixel.0[..3]);
                alpha.push(pixel.0[3]);
            }
            Ok(Self {
                width,
                height,
                rgb: compress_data(&rgb)?,
                alpha: Some(compress_data(&alpha)?),
            })
        } else {
            let rgb = img.to_rgb8();
            Ok(Self {
                width,
                height,
                rgb: compress_data(rgb.as_raw())?,
                alpha: None,
            })
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn image_stream(width: u32, height: u32, color_space: &str, data: Vec<u8>) -> Stream {
    let mut img_dict = Dictionary::new();
    img_dict.set("Type", "XObject");
    img_dict.set("Subtype", "Image");
    img_dict.set("Width", width as i64);
    img_dict.set("Height", height as i64);
    img_dict.set("ColorSpace", color_space);
    img_dict.set("BitsPerComponent", 8_i64);
    img_dict.set("Filter", "FlateDecode");
    Stream::new(img_dict, data)
}

/// Add the image as an XObject, with a soft mask when it has alpha.
pub fn add_image_xobject(doc: &mut Document, asset: &ImageAsset) -> ObjectId {
    let mut stream = image_stream(asset.width, asset.height, "DeviceRGB", asset.rgb.clone());
    if let Some(alpha) = &asset.alpha {
        let mask_id = doc.add_object(image_stream(asset.width, asset.height, "DeviceGray", alpha.clone()));
        stream.dict.set("SMask", Object::Reference(mask_id));
    }
    doc.add_object(stream)
}
