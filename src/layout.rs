//! Page layout: turns one page of the roster into a display list.
//!
//! The layout is a pure function of the page entries, the configuration
//! and the font metrics. Coordinates are in points with the origin at the
//! top-left corner of the page; the PDF writer flips them.

use crate::config::{Align, ColumnContent, ColumnSpec, SheetConfig};
use crate::roster::RosterEntry;

/// Names longer than this many characters are shortened even when they
/// have few parts.
const NAME_LENGTH_LIMIT: usize = 34;
/// Name parts reduced to initials when a name has more parts than this.
const NAME_INITIAL_PARTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontStyle {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageSlot {
    Background,
    Header,
    Footer,
}

/// One primitive drawing instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Image { slot: ImageSlot, x: f64, y: f64, w: f64, h: f64 },
    /// `y` is the text baseline.
    Text { style: FontStyle, size: f64, x: f64, y: f64, text: String },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    FillRect { x: f64, y: f64, w: f64, h: f64, rgb: [u8; 3] },
    LineWidth(f64),
}

/// Font metrics needed to position text.
pub trait TextMeasure {
    /// Advance width of `text` in points.
    fn text_width(&self, style: FontStyle, text: &str, size: f64) -> f64;

    /// Ascender and descender as fractions of the em size (descender is
    /// negative).
    fn vertical_metrics(&self, style: FontStyle) -> (f64, f64);
}

/// A contiguous run of the roster printed on one sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page<'a> {
    /// 1-based.
    pub number: usize,
    pub entries: &'a [RosterEntry],
}

pub fn paginate(roster: &[RosterEntry], page_size: usize) -> Vec<Page<'_>> {
    roster
        .chunks(page_size.max(1))
        .enumerate()
        .map(|(i, entries)| Page { number: i + 1, entries })
        .collect()
}

/// Two-digit, zero-padded row number.
pub fn format_row_number(n: usize) -> String {
    format!("{:02}", n)
}

fn initial(part: &str) -> String {
    part.chars().next().map(|c| format!("{}. ", c)).unwrap_or_default()
}

/// Shorten a full name so it fits the name column.
///
/// Names with up to four parts are only shortened past 34 characters, and
/// then only the first part becomes an initial (the trailing space is
/// kept). Longer names keep the first four parts as initials.
pub fn format_name_initials(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let parts: Vec<&str> = name.split_whitespace().collect();
    if parts.len() <= NAME_INITIAL_PARTS {
        if name.chars().count() > NAME_LENGTH_LIMIT {
            let mut formatted = String::new();
            for (i, part) in parts.iter().enumerate() {
                if i == 0 {
                    formatted.push_str(&initial(part));
                } else {
                    formatted.push_str(part);
                    formatted.push(' ');
                }
            }
            return formatted;
        }
        return name.to_string();
    }

    let mut initials = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i < NAME_INITIAL_PARTS {
            initials.push_str(&initial(part));
        } else {
            initials.push_str(part);
            initials.push(' ');
        }
    }
    initials.trim().to_string()
}

/// Body text of one cell. `row` is 0-based within the page.
pub fn cell_text(column: &ColumnSpec, entry: &RosterEntry, row: usize, index_suffix: &str) -> String {
    let text = match column.content {
        ColumnContent::RowNumber => format_row_number(row + 1),
        ColumnContent::IndexNumber => format!("{}{}", entry.index_no, index_suffix),
        ColumnContent::Name => format_name_initials(&entry.name),
        ColumnContent::Stream => entry.stream.to_string(),
        ColumnContent::Nic => entry.nic.clone(),
        ColumnContent::Blank => String::new(),
    };
    if text.is_empty() || column.body_align() != Align::Left {
        return text;
    }
    format!("{}{}", " ".repeat(column.body_indent()), text)
}

/// Rectangle a piece of text is fitted into.
#[derive(Debug, Clone, Copy)]
struct Cell {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

/// Position `text` inside `cell`: horizontally per `align`, vertically
/// centred on the glyph box.
fn place_text(
    ops: &mut Vec<DrawOp>,
    metrics: &dyn TextMeasure,
    cell: Cell,
    align: Align,
    style: FontStyle,
    size: f64,
    text: &str,
) {
    if text.is_empty() {
        return;
    }
    let width = metrics.text_width(style, text, size);
    if width > cell.w {
        log::warn!(
            "Text {:?} is {:.1}pt wide but its cell is {:.1}pt; it will overflow",
            text,
            width,
            cell.w
        );
    }
    let x = match align {
        Align::Left => cell.x,
        Align::Center => cell.x + (cell.w - width) / 2.0,
    };
    let (ascender, descender) = metrics.vertical_metrics(style);
    let y = cell.y + cell.h / 2.0 + (ascender + descender) * size / 2.0;
    ops.push(DrawOp::Text {
        style,
        size,
        x,
        y,
        text: text.to_string(),
    });
}

fn draw_template(ops: &mut Vec<DrawOp>, config: &SheetConfig) {
    let assets = &config.assets;
    let slots = [
        (ImageSlot::Background, &assets.background),
        (ImageSlot::Header, &assets.header),
        (ImageSlot::Footer, &assets.footer),
    ];
    for (slot, placement) in slots {
        if let Some(p) = placement {
            ops.push(DrawOp::Image {
                slot,
                x: p.x.as_points(),
                y: p.y.as_points(),
                w: p.w.as_points(),
                h: p.h.as_points(),
            });
        }
    }
}

fn draw_metadata(ops: &mut Vec<DrawOp>, config: &SheetConfig, metrics: &dyn TextMeasure) {
    for field in &config.metadata_fields {
        let cell = Cell {
            x: field.x.as_points(),
            y: field.y.as_points(),
            w: field.w.as_points(),
            h: field.h.as_points(),
        };
        let text = config.metadata.value(field.field);
        place_text(ops, metrics, cell, field.align, FontStyle::Regular, field.font_size.as_points(), text);
    }
}

fn draw_table(ops: &mut Vec<DrawOp>, page: &Page, config: &SheetConfig, metrics: &dyn TextMeasure) {
    let table = &config.table;
    let start_x = table.x.as_points();
    let start_y = table.y.as_points();
    let row_height = table.row_height.as_points();
    let end_x = start_x + table.width();
    // Column rules always span the full capacity, header row included.
    let grid_bottom = start_y + (table.page_size + 1) as f64 * row_height;

    ops.push(DrawOp::LineWidth(table.line_width.as_points()));

    let mut x = start_x;
    for column in &table.columns {
        let w = column.width.as_points();
        ops.push(DrawOp::FillRect {
            x,
            y: start_y,
            w,
            h: row_height,
            rgb: table.header_fill,
        });
        x += w;
    }
    ops.push(DrawOp::Line { x1: start_x, y1: start_y, x2: end_x, y2: start_y });

    let header_size = table.header_font_size.as_points();
    let mut x = start_x;
    for column in &table.columns {
        let w = column.width.as_points();
        let cell = Cell { x, y: start_y, w, h: row_height };
        place_text(ops, metrics, cell, Align::Center, FontStyle::Bold, header_size, &column.title);
        x += w;
    }

    let body_size = table.body_font_size.as_points();
    let mut y = start_y + row_height;
    for (row, entry) in page.entries.iter().enumerate() {
        ops.push(DrawOp::Line { x1: start_x, y1: y, x2: end_x, y2: y });
        let mut x = start_x;
        for column in &table.columns {
            let w = column.width.as_points();
            let text = cell_text(column, entry, row, &table.index_suffix);
            let cell = Cell { x, y, w, h: row_height };
            place_text(ops, metrics, cell, column.body_align(), FontStyle::Regular, body_size, &text);
            x += w;
        }
        y += row_height;
    }

    let mut x = start_x;
    ops.push(DrawOp::Line { x1: x, y1: start_y, x2: x, y2: grid_bottom });
    for column in &table.columns {
        x += column.width.as_points();
        ops.push(DrawOp::Line { x1: x, y1: start_y, x2: x, y2: grid_bottom });
    }

    ops.push(DrawOp::Line { x1: start_x, y1: y, x2: end_x, y2: y });
}

/// Lay out one sheet: template images, metadata, then the table.
pub fn layout_page(page: &Page, config: &SheetConfig, metrics: &dyn TextMeasure) -> Vec<DrawOp> {
    let mut ops = Vec::new();
    draw_template(&mut ops, config);
    draw_metadata(&mut ops, config, metrics);
    draw_table(&mut ops, page, config, metrics);
    ops
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::roster::StreamLabel;

    /// Every glyph advances half an em.
    pub(crate) struct FixedMetrics;

    impl TextMeasure for FixedMetrics {
        fn text_width(&self, style: FontStyle, text: &str, size: f64) -> f64 {
            let advance = match style {
                FontStyle::Regular => 0.5,
                FontStyle::Bold => 0.6,
            };
            text.chars().count() as f64 * size * advance
        }

        fn vertical_metrics(&self, _style: FontStyle) -> (f64, f64) {
            (0.8, -0.2)
        }
    }

    pub(crate) fn roster(len: usize) -> Vec<RosterEntry> {
        (0..len)
            .map(|i| RosterEntry {
                index_no: 2_500_000 + i as i64,
                name: format!("Student {}", i),
                stream: StreamLabel::from_id((i % 5) as i64),
                nic: format!("2005{:08}", i),
            })
            .collect()
    }

    fn texts(ops: &[DrawOp]) -> Vec<&str> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_format_name_empty() {
        assert_eq!(format_name_initials(""), "");
    }

    #[test]
    fn test_format_name_short_unchanged() {
        assert_eq!(format_name_initials("Alice Fernando"), "Alice Fernando");
        assert_eq!(format_name_initials("Kamala Devi Sivarasa Thurairajah"), "Kamala Devi Sivarasa Thurairajah");
    }

    #[test]
    fn test_format_name_long_two_parts() {
        assert_eq!(
            format_name_initials("Abcdefghijklmnopqrstuvwxyz Fernandopillai"),
            "A. Fernandopillai "
        );
    }

    #[test]
    fn test_format_name_long_four_parts() {
        // 35 characters, four parts.
        let name = "Sivapalan Yogeswaran Kanthaiah Rudr";
        assert_eq!(name.len(), 35);
        assert_eq!(format_name_initials(name), "S. Yogeswaran Kanthaiah Rudr ");
    }

    #[test]
    fn test_format_name_exactly_limit_unchanged() {
        let name = "Sivapalan Yogeswaran Kanthaiah Rud";
        assert_eq!(name.len(), 34);
        assert_eq!(format_name_initials(name), name);
    }

    #[test]
    fn test_format_name_many_parts() {
        assert_eq!(format_name_initials("A B C D Eswaran"), "A. B. C. D. Eswaran");
        assert_eq!(
            format_name_initials("Mohamed Ismail Mohamed Nazeer Fathima Rizna"),
            "M. I. M. N. Fathima Rizna"
        );
    }

    #[test]
    fn test_format_name_extra_whitespace() {
        assert_eq!(format_name_initials("  A  B C   D Eswaran "), "A. B. C. D. Eswaran");
    }

    #[test]
    fn test_format_row_number() {
        assert_eq!(format_row_number(1), "01");
        assert_eq!(format_row_number(9), "09");
        assert_eq!(format_row_number(25), "25");
    }

    #[test]
    fn test_paginate_counts_and_order() {
        for len in [0, 1, 24, 25, 26, 50, 51, 137] {
            let roster = roster(len);
            let pages = paginate(&roster, 25);
            assert_eq!(pages.len(), len.div_ceil(25));
            let joined: Vec<RosterEntry> = pages.iter().flat_map(|p| p.entries.iter().cloned()).collect();
            assert_eq!(joined, roster);
            for (i, page) in pages.iter().enumerate() {
                assert_eq!(page.number, i + 1);
                assert!(page.entries.len() <= 25);
            }
        }
    }

    #[test]
    fn test_paginate_short_last_page() {
        let roster = roster(60);
        let pages = paginate(&roster, 25);
        assert_eq!(pages[2].entries.len(), 10);
        assert_eq!(pages[2].entries[0].index_no, roster[50].index_no);
    }

    #[test]
    fn test_cell_text() {
        let config = SheetConfig::default();
        let columns = &config.table.columns;
        let entry = RosterEntry {
            index_no: 2500104,
            name: "A B C D Eswaran".to_string(),
            stream: StreamLabel::Bio,
            nic: "200412345678".to_string(),
        };
        let cells: Vec<String> = columns.iter().map(|c| cell_text(c, &entry, 6, "000")).collect();
        assert_eq!(cells, ["07", "2500104000", "  A. B. C. D. Eswaran", "", "", ""]);

        let stream = ColumnSpec {
            title: "Stream".to_string(),
            width: crate::config::Dimension(50.0),
            content: ColumnContent::Stream,
            align: None,
            indent: None,
        };
        assert_eq!(cell_text(&stream, &entry, 0, "000"), "BIO");
    }

    #[test]
    fn test_layout_page_contents() {
        let config = SheetConfig::default();
        let roster = roster(3);
        let page = Page { number: 1, entries: &roster };
        let ops = layout_page(&page, &config, &FixedMetrics);

        assert_eq!(
            ops[0],
            DrawOp::Image { slot: ImageSlot::Header, x: 25.0, y: 15.0, w: 545.0, h: 130.0 }
        );
        assert!(matches!(ops[1], DrawOp::Image { slot: ImageSlot::Footer, .. }));

        let texts = texts(&ops);
        // Exam centre is blank by default and draws nothing.
        assert_eq!(&texts[..6], ["10", "EM", "II", "JAFFNA", "ICT", "2025-07-21"]);
        assert_eq!(&texts[6..12], ["No", "IndexNo", "Name", "Signature", "Marks", "Checked"]);
        assert_eq!(&texts[12..15], ["01", "2500000000", "  Student 0"]);
        assert_eq!(texts.len(), 12 + 3 * 3);

        let fills = ops.iter().filter(|op| matches!(op, DrawOp::FillRect { .. })).count();
        assert_eq!(fills, 6);
    }

    #[test]
    fn test_layout_table_lines() {
        let config = SheetConfig::default();
        let roster = roster(2);
        let page = Page { number: 2, entries: &roster };
        let ops = layout_page(&page, &config, &FixedMetrics);
        let lines: Vec<&DrawOp> = ops.iter().filter(|op| matches!(op, DrawOp::Line { .. })).collect();

        // Header top, two row tops, seven column rules, bottom.
        assert_eq!(lines.len(), 1 + 2 + 7 + 1);
        let full_height = 160.0 + 26.0 * 24.5;
        assert!(lines.iter().any(|op| **op == DrawOp::Line { x1: 570.0, y1: 160.0, x2: 570.0, y2: full_height }));
        let bottom = 160.0 + 3.0 * 24.5;
        assert_eq!(*lines[lines.len() - 1], DrawOp::Line { x1: 25.0, y1: bottom, x2: 570.0, y2: bottom });
    }

    #[test]
    fn test_text_alignment() {
        let config = SheetConfig::default();
        let roster = roster(1);
        let page = Page { number: 1, entries: &roster };
        let ops = layout_page(&page, &config, &FixedMetrics);

        let find = |wanted: &str| {
            ops.iter()
                .find_map(|op| match op {
                    DrawOp::Text { text, x, y, .. } if text == wanted => Some((*x, *y)),
                    _ => None,
                })
                .unwrap()
        };

        // "01" at 10pt is 10pt wide, centred in the 20pt column.
        let (x, y) = find("01");
        assert!((x - 30.0).abs() < 1e-9);
        // Row cell spans 184.5..209; baseline = middle + (0.8 - 0.2) * 10 / 2.
        assert!((y - (184.5 + 12.25 + 3.0)).abs() < 1e-9);

        // Names start at the column edge, indented with spaces.
        let (x, _) = find("  Student 0");
        assert!((x - 115.0).abs() < 1e-9);

        // Left-aligned metadata.
        let (x, _) = find("JAFFNA");
        assert!((x - 410.0).abs() < 1e-9);
    }

    #[test]
    fn test_layout_is_deterministic() {
        let config = SheetConfig::default();
        let roster = roster(25);
        let page = Page { number: 1, entries: &roster };
        let first = layout_page(&page, &config, &FixedMetrics);
        let second = layout_page(&page, &config, &FixedMetrics);
        assert_eq!(first, second);
    }

    #[test]
    fn test_background_drawn_first() {
        let mut config = SheetConfig::default();
        config.assets.background = Some(crate::config::ImagePlacement {
            file: "assets/watermark.png".into(),
            x: crate::config::Dimension(0.0),
            y: crate::config::Dimension(0.0),
            w: crate::config::Dimension(595.28),
            h: crate::config::Dimension(841.89),
        });
        config.assets.footer = None;
        let ops = layout_page(&Page { number: 1, entries: &[] }, &config, &FixedMetrics);
        assert!(matches!(ops[0], DrawOp::Image { slot: ImageSlot::Background, .. }));
        assert!(matches!(ops[1], DrawOp::Image { slot: ImageSlot::Header, .. }));
        assert!(!ops.iter().any(|op| matches!(op, DrawOp::Image { slot: ImageSlot::Footer, .. })));
    }
}
