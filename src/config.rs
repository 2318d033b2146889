//! Configuration loading and parsing.
//!
//! This module handles:
//! - Loading and validating settings.json (metadata, data source, assets,
//!   table geometry and column list)
//! - Defaults reproducing the stock admission sheet layout
//! - Unit conversion for dimensions (mm, cm, in, pt)

use serde::{Deserialize, Deserializer};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::SheetError;

/// Largest page capacity whose row numbers still fit in two digits.
pub const MAX_PAGE_SIZE: usize = 99;

/// Dimension value that can be specified as:
/// - A number (interpreted as points)
/// - A string with unit: e.g., "100 mm", "10 cm", "1 in" (inches)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension(pub f64);

impl Dimension {
    /// Convert to points (internal PDF unit)
    pub fn as_points(&self) -> f64 {
        self.0
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let split = value
            .find(|c: char| c.is_whitespace() || c.is_ascii_alphabetic())
            .unwrap_or(value.len());
        let (num_str, unit) = value.split_at(split);
        let num_str = num_str.trim();
        let unit = unit.trim().to_lowercase();

        let num: f64 = num_str
            .parse()
            .map_err(|_| format!("invalid number in dimension: {}", num_str))?;

        // 1 inch = 72 points
        let points = match unit.as_str() {
            "" | "pt" | "point" | "points" => num,
            "mm" => num * 72.0 / 25.4,
            "cm" => num * 72.0 / 2.54,
            "in" | "inch" | "inches" => num * 72.0,
            _ => return Err(format!("unknown unit '{}'. Supported: mm, cm, in, pt", unit)),
        };

        Ok(Dimension(points))
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DimensionVisitor;

        impl serde::de::Visitor<'_> for DimensionVisitor {
            type Value = Dimension;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a number or a string with unit (e.g., \"100 mm\", \"10 cm\", \"1 in\")")
            }

            fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Self::Value, E> {
                Ok(Dimension(value as f64))
            }

            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(Dimension(value as f64))
            }

            fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<Self::Value, E> {
                Ok(Dimension(value))
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Self::Value, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DimensionVisitor)
    }
}

/// Horizontal alignment of text inside its cell. Text is always centred
/// vertically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
}

/// Per-run fields printed identically in every page header.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SheetMetadata {
    pub district: String,
    pub exam_centre: String,
    pub subject: String,
    pub subject_code: String,
    pub part: String,
    pub medium: String,
    pub date: String,
}

impl Default for SheetMetadata {
    fn default() -> Self {
        Self {
            district: "JAFFNA".to_string(),
            exam_centre: String::new(),
            subject: "ICT".to_string(),
            subject_code: "10".to_string(),
            part: "II".to_string(),
            medium: "EM".to_string(),
            date: "2025-07-21".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKey {
    District,
    ExamCentre,
    Subject,
    SubjectCode,
    Part,
    Medium,
    Date,
}

impl SheetMetadata {
    pub fn value(&self, key: MetadataKey) -> &str {
        match key {
            MetadataKey::District => &self.district,
            MetadataKey::ExamCentre => &self.exam_centre,
            MetadataKey::Subject => &self.subject,
            MetadataKey::SubjectCode => &self.subject_code,
            MetadataKey::Part => &self.part,
            MetadataKey::Medium => &self.medium,
            MetadataKey::Date => &self.date,
        }
    }
}

/// Where one metadata value is printed.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataField {
    pub field: MetadataKey,
    pub x: Dimension,
    pub y: Dimension,
    #[serde(default = "default_metadata_width")]
    pub w: Dimension,
    #[serde(default = "default_metadata_height")]
    pub h: Dimension,
    pub align: Align,
    pub font_size: Dimension,
}

fn default_metadata_width() -> Dimension {
    Dimension(200.0)
}

fn default_metadata_height() -> Dimension {
    Dimension(20.0)
}

fn default_metadata_fields() -> Vec<MetadataField> {
    let field = |field, x, y, align, font_size| MetadataField {
        field,
        x: Dimension(x),
        y: Dimension(y),
        w: default_metadata_width(),
        h: default_metadata_height(),
        align,
        font_size: Dimension(font_size),
    };
    vec![
        field(MetadataKey::SubjectCode, 160.0, 110.0, Align::Center, 12.0),
        field(MetadataKey::Medium, 200.0, 110.0, Align::Center, 12.0),
        field(MetadataKey::Part, 235.0, 110.0, Align::Center, 12.0),
        field(MetadataKey::District, 410.0, 115.0, Align::Left, 10.0),
        field(MetadataKey::ExamCentre, 410.0, 95.0, Align::Left, 10.0),
        field(MetadataKey::Subject, 410.0, 75.0, Align::Left, 10.0),
        field(MetadataKey::Date, 140.0, 117.0, Align::Left, 10.0),
    ]
}

/// What a table column prints in each body row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnContent {
    RowNumber,
    IndexNumber,
    Name,
    Stream,
    Nic,
    /// Left empty to be filled in by hand.
    Blank,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    pub title: String,
    pub width: Dimension,
    pub content: ColumnContent,
    #[serde(default)]
    pub align: Option<Align>,
    /// Leading spaces placed before left-aligned body text.
    #[serde(default)]
    pub indent: Option<usize>,
}

impl ColumnSpec {
    pub fn body_align(&self) -> Align {
        self.align.unwrap_or(match self.content {
            ColumnContent::Name => Align::Left,
            _ => Align::Center,
        })
    }

    pub fn body_indent(&self) -> usize {
        self.indent.unwrap_or(match self.content {
            ColumnContent::Name => 2,
            _ => 0,
        })
    }
}

fn default_columns() -> Vec<ColumnSpec> {
    let column = |title: &str, width, content| ColumnSpec {
        title: title.to_string(),
        width: Dimension(width),
        content,
        align: None,
        indent: None,
    };
    vec![
        column("No", 20.0, ColumnContent::RowNumber),
        column("IndexNo", 70.0, ColumnContent::IndexNumber),
        column("Name", 260.0, ColumnContent::Name),
        column("Signature", 80.0, ColumnContent::Blank),
        column("Marks", 50.0, ColumnContent::Blank),
        column("Checked", 65.0, ColumnContent::Blank),
    ]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableSection {
    pub x: Dimension,
    pub y: Dimension,
    pub row_height: Dimension,
    pub page_size: usize,
    pub line_width: Dimension,
    pub header_fill: [u8; 3],
    pub header_font_size: Dimension,
    pub body_font_size: Dimension,
    pub index_suffix: String,
    pub columns: Vec<ColumnSpec>,
}

impl Default for TableSection {
    fn default() -> Self {
        Self {
            x: Dimension(25.0),
            y: Dimension(160.0),
            row_height: Dimension(24.5),
            page_size: 25,
            line_width: Dimension(0.5),
            header_fill: [220, 220, 220],
            header_font_size: Dimension(11.5),
            body_font_size: Dimension(10.0),
            index_suffix: "000".to_string(),
            columns: default_columns(),
        }
    }
}

impl TableSection {
    pub fn width(&self) -> f64 {
        self.columns.iter().map(|c| c.width.as_points()).sum()
    }
}

/// A raster image drawn at a fixed rectangle.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagePlacement {
    pub file: PathBuf,
    pub x: Dimension,
    pub y: Dimension,
    pub w: Dimension,
    pub h: Dimension,
}

/// A font given either as a file or as a family resolved from the system
/// font database. `file` wins when both are set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FontSpec {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub family: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsSection {
    pub header: Option<ImagePlacement>,
    pub footer: Option<ImagePlacement>,
    pub background: Option<ImagePlacement>,
    pub regular_font: FontSpec,
    pub bold_font: FontSpec,
}

impl Default for AssetsSection {
    fn default() -> Self {
        let dejavu = || FontSpec {
            file: None,
            family: Some("DejaVu Sans".to_string()),
        };
        Self {
            header: Some(ImagePlacement {
                file: PathBuf::from("assets/header.png"),
                x: Dimension(25.0),
                y: Dimension(15.0),
                w: Dimension(545.0),
                h: Dimension(130.0),
            }),
            footer: Some(ImagePlacement {
                file: PathBuf::from("assets/footer.png"),
                x: Dimension(25.0),
                y: Dimension(810.0),
                w: Dimension(545.0),
                h: Dimension(20.0),
            }),
            background: None,
            regular_font: dejavu(),
            bold_font: dejavu(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Sqlite { path: PathBuf },
    Csv { path: PathBuf },
}

impl Default for SourceSpec {
    fn default() -> Self {
        SourceSpec::Sqlite {
            path: PathBuf::from("students.db"),
        }
    }
}

impl SourceSpec {
    /// Pick the source kind from a file extension: `.csv` is read as CSV,
    /// anything else is opened as an SQLite database.
    pub fn from_path(path: PathBuf) -> Self {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv {
            SourceSpec::Csv { path }
        } else {
            SourceSpec::Sqlite { path }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
    pub file_prefix: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("generated"),
            file_prefix: "admission_sheet_no_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PageSection {
    pub width: Dimension,
    pub height: Dimension,
}

impl Default for PageSection {
    /// A4 portrait.
    fn default() -> Self {
        Self {
            width: Dimension(595.28),
            height: Dimension(841.89),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub metadata: SheetMetadata,
    pub source: SourceSpec,
    pub output: OutputSection,
    pub page: PageSection,
    pub assets: AssetsSection,
    #[serde(default = "default_metadata_fields")]
    pub metadata_fields: Vec<MetadataField>,
    pub table: TableSection,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            metadata: SheetMetadata::default(),
            source: SourceSpec::default(),
            output: OutputSection::default(),
            page: PageSection::default(),
            assets: AssetsSection::default(),
            metadata_fields: default_metadata_fields(),
            table: TableSection::default(),
        }
    }
}

impl SheetConfig {
    /// Reject values the renderer cannot lay out.
    pub fn validate(&self) -> Result<(), SheetError> {
        let table = &self.table;
        if table.page_size == 0 || table.page_size > MAX_PAGE_SIZE {
            return Err(SheetError::Config(format!(
                "table.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, table.page_size
            )));
        }
        if table.columns.is_empty() {
            return Err(SheetError::Config("table.columns must not be empty".to_string()));
        }
        if let Some(column) = table.columns.iter().find(|c| c.width.as_points() <= 0.0) {
            return Err(SheetError::Config(format!(
                "column '{}' must have a positive width",
                column.title
            )));
        }
        if table.row_height.as_points() <= 0.0 {
            return Err(SheetError::Config("table.row_height must be positive".to_string()));
        }
        if self.page.width.as_points() <= 0.0 || self.page.height.as_points() <= 0.0 {
            return Err(SheetError::Config("page dimensions must be positive".to_string()));
        }
        Ok(())
    }
}

/// Load settings.json, falling back to the stock layout when the file does
/// not exist.
pub fn load_settings_config(path: &Path) -> Result<SheetConfig, SheetError> {
    if !path.exists() {
        log::info!("No settings file at {:?}, using the default sheet layout", path);
        return Ok(SheetConfig::default());
    }
    let file = File::open(path)
        .map_err(|e| SheetError::Config(format!("Failed to open settings file at {:?}: {}", path, e)))?;
    let config: SheetConfig = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| SheetError::Config(format!("Failed to parse {:?}: {}", path, e)))?;
    config.validate()?;
    Ok(config)
}
