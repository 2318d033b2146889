//! Admission sheet rendering: one PDF document per page of the roster.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::SheetConfig;
use crate::error::SheetError;
use crate::layout::{layout_page, paginate, FontStyle, ImageSlot, Page, TextMeasure};
use crate::pdf::{write_page, FontSet, ImageAsset, PageResources};
use crate::roster::RosterEntry;

/// Fonts and template images, loaded once and shared by every page.
pub struct SheetAssets {
    pub fonts: FontSet,
    images: BTreeMap<ImageSlot, ImageAsset>,
}

impl SheetAssets {
    /// Load every asset the configuration names. Paths are relative to
    /// `base_dir`.
    pub fn load(config: &SheetConfig, base_dir: &Path) -> Result<Self, SheetError> {
        let assets = &config.assets;
        let fonts = FontSet::load(&assets.regular_font, &assets.bold_font, base_dir)?;
        log::info!("Using fonts {} and {}", fonts.regular.name(), fonts.bold.name());

        let mut images = BTreeMap::new();
        let slots = [
            (ImageSlot::Background, &assets.background),
            (ImageSlot::Header, &assets.header),
            (ImageSlot::Footer, &assets.footer),
        ];
        for (slot, placement) in slots {
            if let Some(placement) = placement {
                let image = ImageAsset::load(&base_dir.join(&placement.file))?;
                let (w, h) = image.dimensions();
                log::debug!("Loaded {:?} image {:?} ({}x{})", slot, placement.file, w, h);
                images.insert(slot, image);
            }
        }

        Ok(Self { fonts, images })
    }

    pub fn resources(&self) -> PageResources<'_> {
        let mut resources = PageResources::new()
            .with_font(FontStyle::Regular, &self.fonts.regular)
            .with_font(FontStyle::Bold, &self.fonts.bold);
        for (slot, image) in &self.images {
            resources = resources.with_image(*slot, image);
        }
        resources
    }
}

/// File name of the sheet for a 1-based page number.
pub fn sheet_file_name(prefix: &str, page_number: usize) -> String {
    format!("{}{}.pdf", prefix, page_number)
}

/// Write a finished document. A partially written file is removed.
fn write_document(path: &Path, bytes: &[u8]) -> Result<(), SheetError> {
    let result = File::create(path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()
    });
    result.map_err(|source| {
        let _ = fs::remove_file(path);
        SheetError::Output {
            path: path.to_path_buf(),
            source,
        }
    })
}

pub struct SheetRenderer<'a> {
    config: &'a SheetConfig,
    metrics: &'a dyn TextMeasure,
    resources: PageResources<'a>,
}

impl<'a> SheetRenderer<'a> {
    pub fn new(config: &'a SheetConfig, metrics: &'a dyn TextMeasure, resources: PageResources<'a>) -> Self {
        Self {
            config,
            metrics,
            resources,
        }
    }

    /// Render one page to PDF bytes.
    pub fn render_page(&self, page: &Page) -> Result<Vec<u8>, SheetError> {
        let ops = layout_page(page, self.config, self.metrics);
        write_page(&ops, &self.config.page, &self.resources)
    }

    /// Render and write every page of the roster in order, stopping at the
    /// first failure. Returns the written paths.
    pub fn write_sheets(&self, roster: &[RosterEntry], out_dir: &Path) -> Result<Vec<PathBuf>, SheetError> {
        fs::create_dir_all(out_dir).map_err(|source| SheetError::Output {
            path: out_dir.to_path_buf(),
            source,
        })?;

        let mut written = Vec::new();
        for page in paginate(roster, self.config.table.page_size) {
            let bytes = self.render_page(&page)?;
            let name = sheet_file_name(&self.config.output.file_prefix, page.number);
            let path = out_dir.join(&name);
            write_document(&path, &bytes)?;
            log::info!("Generated: {} ({} students)", name, page.entries.len());
            written.push(path);
        }
        Ok(written)
    }
}
