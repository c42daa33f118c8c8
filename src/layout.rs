//! Page Layout - Two-Column Cursor Algorithm
//!
//! Turns a template record plus per-document data (VIN, effective date)
//! into a flat list of positioned elements for exactly one landscape
//! A4 page. All coordinates are millimetres from the top-left corner;
//! the renderer converts to PDF user space.
//!
//! The cursor flows down the left column, switches to the right column at
//! most once when it passes `column_break_y`, and never paginates: content
//! past the bottom of the right column is clipped.

use tracing::debug;

use crate::sanitize::{clean_display, transliterate};
use crate::templates::{normalize_code, TemplateRecord};

/// Row code whose value cell is replaced by the VIN and whose first
/// left-column occurrence triggers the description/signature/signoff block.
pub const VIN_ROW_CODE: &str = "1";

/// Document title line.
pub const PAGE_TITLE: &str = "CERTIFICATE OF CONFORMITY (CoC)";

/// Average glyph width as a fraction of the font size. Helvetica body text
/// at the sizes used here measures close to half an em per character.
const GLYPH_WIDTH_EM: f64 = 0.5;

const MM_PER_PT: f64 = 25.4 / 72.0;

/// Baseline position inside a line box, as a fraction of the box height.
const BASELINE_FACTOR: f64 = 0.75;

/// Fixed page geometry and flow thresholds, in millimetres (font sizes in
/// points). One canonical set of values; the layout algorithm reads
/// everything from here.
#[derive(Debug, Clone, Copy)]
pub struct LayoutConfig {
    pub page_width: f64,
    pub page_height: f64,
    /// Left edge of the first column.
    pub margin: f64,
    pub title_y: f64,
    pub title_box_height: f64,
    pub subtitle_box_height: f64,
    /// Gap between the subtitle and the first flowed element.
    pub header_gap: f64,
    pub title_size: f64,
    pub subtitle_size: f64,
    pub body_size: f64,
    pub line_height: f64,
    /// Left-column cursor past this Y switches emission to the right column.
    pub column_break_y: f64,
    pub second_column_x: f64,
    pub code_cell_width: f64,
    pub label_cell_width: f64,
    /// Value cell X offset from the column origin.
    pub value_cell_offset: f64,
    pub value_cell_width: f64,
    /// Width of the commitment and description blocks.
    pub text_block_width: f64,
    pub commitment_gap: f64,
    /// Gap between the triggering row and the description block.
    pub block_gap: f64,
    /// Description line height as a fraction of `line_height`.
    pub description_leading: f64,
    pub signature_drop: f64,
    pub signature_offset_x: f64,
    pub signature_height: f64,
    /// Signoff line Y offset below the signature anchor.
    pub signoff_drop: f64,
    /// Cursor advance from the signature anchor past the whole block.
    pub block_tail: f64,
    pub divider_x: f64,
    pub divider_bottom_y: f64,
    pub logo_x: f64,
    pub logo_y: f64,
    pub logo_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 297.0,
            page_height: 210.0,
            margin: 10.0,
            title_y: 5.0,
            title_box_height: 7.0,
            subtitle_box_height: 5.0,
            header_gap: 4.0,
            title_size: 14.0,
            subtitle_size: 10.0,
            body_size: 8.5,
            line_height: 5.0,
            column_break_y: 190.0,
            second_column_x: 155.0,
            code_cell_width: 14.0,
            label_cell_width: 60.0,
            value_cell_offset: 76.0,
            value_cell_width: 64.0,
            text_block_width: 140.0,
            commitment_gap: 1.5,
            block_gap: 2.0,
            description_leading: 0.82,
            signature_drop: 5.0,
            signature_offset_x: 90.0,
            signature_height: 18.0,
            signoff_drop: 10.0,
            block_tail: 25.0,
            divider_x: 152.0,
            divider_bottom_y: 200.0,
            logo_x: 250.0,
            logo_y: 5.0,
            logo_height: 12.0,
        }
    }
}

impl LayoutConfig {
    /// Y where flowed content starts; also the reset point for the right
    /// column and the top of the divider line.
    pub fn header_bottom(&self) -> f64 {
        self.title_y + self.title_box_height + self.subtitle_box_height + self.header_gap
    }
}

/// Which optional image assets exist for this render. Layout only needs
/// presence; the renderer holds the bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetAvailability {
    pub logo: bool,
    pub signature: bool,
}

/// One positioned page element. Text `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text {
        x: f64,
        y: f64,
        size: f64,
        bold: bool,
        text: String,
    },
    Logo {
        x: f64,
        y: f64,
        height: f64,
    },
    Signature {
        x: f64,
        y: f64,
        height: f64,
    },
    Rule {
        x: f64,
        top: f64,
        bottom: f64,
    },
}

/// The laid-out page: elements in emission order.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub elements: Vec<Element>,
    pub header_bottom: f64,
}

impl PageLayout {
    /// Text elements only, in emission order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, f64, f64)> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text { x, y, text, .. } => Some((text.as_str(), *x, *y)),
            _ => None,
        })
    }
}

/// Estimated rendered width of `text` at `size_pt`, in millimetres.
pub fn text_width_mm(text: &str, size_pt: f64) -> f64 {
    text.chars().count() as f64 * size_pt * GLYPH_WIDTH_EM * MM_PER_PT
}

/// Greedy word wrap into lines that fit `width_mm` at `size_pt`. Embedded
/// newlines force breaks; a single word longer than the line is hard-broken
/// rather than overflowed. Empty input yields one empty line, matching the
/// one-line-box advance of an empty cell.
pub fn wrap_text(text: &str, width_mm: f64, size_pt: f64) -> Vec<String> {
    let char_width = size_pt * GLYPH_WIDTH_EM * MM_PER_PT;
    let max_chars = (width_mm / char_width).floor().max(1.0) as usize;

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            let candidate = if current.is_empty() {
                word_len
            } else {
                current.chars().count() + 1 + word_len
            };
            if candidate <= max_chars {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            } else if word_len > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let mut rest: Vec<char> = word.chars().collect();
                while rest.len() > max_chars {
                    lines.push(rest.drain(..max_chars).collect());
                }
                current = rest.into_iter().collect();
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        lines.push(current);
    }
    lines
}

/// Lay out one document page. Deterministic: identical inputs produce an
/// identical element list.
pub fn lay_out_page(
    vin: &str,
    template: &TemplateRecord,
    date: &str,
    assets: AssetAvailability,
    config: &LayoutConfig,
) -> PageLayout {
    let mut elements = Vec::new();
    let vin_display = transliterate(vin);

    // Header: centered title and chassis line, logo pinned top-right.
    push_centered(
        &mut elements,
        config,
        config.title_y,
        config.title_box_height,
        config.title_size,
        PAGE_TITLE.to_string(),
    );
    push_centered(
        &mut elements,
        config,
        config.title_y + config.title_box_height,
        config.subtitle_box_height,
        config.subtitle_size,
        format!("Chassis No: {vin_display}"),
    );
    if assets.logo {
        elements.push(Element::Logo {
            x: config.logo_x,
            y: config.logo_y,
            height: config.logo_height,
        });
    }

    let header_bottom = config.header_bottom();
    let mut y = header_bottom;

    // Commitment block: skipped only when the text is explicitly empty.
    let commitment_raw = template.identity.commitment_text();
    if !commitment_raw.is_empty() {
        let lines = wrap_text(
            &clean_display(commitment_raw),
            config.text_block_width,
            config.body_size,
        );
        push_block(
            &mut elements,
            config.margin,
            y,
            config.line_height,
            config.body_size,
            &lines,
        );
        y += lines.len() as f64 * config.line_height + config.commitment_gap;
    }

    let mut x = config.margin;
    let mut block_emitted = false;

    for row in template.sorted_rows() {
        let code = normalize_code(&row.code);
        let value = if code == VIN_ROW_CODE {
            vin_display.clone()
        } else {
            clean_display(&row.value)
        };

        if y > config.column_break_y && x == config.margin {
            debug!(y, "left column exhausted, switching to right column");
            x = config.second_column_x;
            y = header_bottom;
        }

        let label_lines = wrap_text(
            &clean_display(&row.label),
            config.label_cell_width,
            config.body_size,
        );
        let value_lines = wrap_text(
            &format!(": {value}"),
            config.value_cell_width,
            config.body_size,
        );

        elements.push(Element::Text {
            x,
            y: y + BASELINE_FACTOR * config.line_height,
            size: config.body_size,
            bold: true,
            text: transliterate(&code),
        });
        push_block(
            &mut elements,
            x + config.code_cell_width,
            y,
            config.line_height,
            config.body_size,
            &label_lines,
        );
        push_block(
            &mut elements,
            x + config.value_cell_offset,
            y,
            config.line_height,
            config.body_size,
            &value_lines,
        );
        y += config.line_height * label_lines.len().max(value_lines.len()) as f64;

        // One-time block below the first left-column VIN row. A VIN row in
        // the right column does not trigger it.
        if code == VIN_ROW_CODE && !block_emitted && x == config.margin {
            y += config.block_gap;
            let description_height = config.line_height * config.description_leading;
            let description_lines = wrap_text(
                &clean_display(template.identity.description_text()),
                config.text_block_width,
                config.body_size,
            );
            push_block(
                &mut elements,
                x,
                y,
                description_height,
                config.body_size,
                &description_lines,
            );
            y += description_lines.len() as f64 * description_height;

            let signature_y = y + config.signature_drop;
            if assets.signature {
                elements.push(Element::Signature {
                    x: x + config.signature_offset_x,
                    y: signature_y,
                    height: config.signature_height,
                });
            }
            let place = transliterate(template.identity.place());
            elements.push(Element::Text {
                x,
                y: signature_y
                    + config.signoff_drop
                    + BASELINE_FACTOR * config.line_height,
                size: config.body_size,
                bold: true,
                text: format!("Place: {place} | Date: {date}"),
            });
            y = signature_y + config.block_tail;
            block_emitted = true;
            debug!("signoff block emitted");
        }
    }

    elements.push(Element::Rule {
        x: config.divider_x,
        top: header_bottom,
        bottom: config.divider_bottom_y,
    });

    PageLayout {
        elements,
        header_bottom,
    }
}

/// Centered single line inside a full-width box at `top`.
fn push_centered(
    elements: &mut Vec<Element>,
    config: &LayoutConfig,
    top: f64,
    box_height: f64,
    size: f64,
    text: String,
) {
    let text = transliterate(&text);
    let x = ((config.page_width - text_width_mm(&text, size)) / 2.0).max(config.margin);
    elements.push(Element::Text {
        x,
        y: top + BASELINE_FACTOR * box_height,
        size,
        bold: true,
        text,
    });
}

/// Stack of wrapped lines starting at `top` with the given line height.
fn push_block(
    elements: &mut Vec<Element>,
    x: f64,
    top: f64,
    line_height: f64,
    size: f64,
    lines: &[String],
) {
    for (i, line) in lines.iter().enumerate() {
        elements.push(Element::Text {
            x,
            y: top + i as f64 * line_height + BASELINE_FACTOR * line_height,
            size,
            bold: true,
            text: line.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{Identity, TechnicalRow};
    use serde_json::json;

    fn row(seq: i64, code: &str, label: &str, value: &str) -> TechnicalRow {
        TechnicalRow {
            sequence: json!(seq),
            code: code.to_string(),
            label: label.to_string(),
            value: value.to_string(),
        }
    }

    /// Template with explicit empty commitment so rows start at the header
    /// bottom, which keeps the column math easy to assert.
    fn bare_template(rows: Vec<TechnicalRow>) -> TemplateRecord {
        TemplateRecord {
            identity: Identity {
                brand: Some("Ford".to_string()),
                commitment: Some(String::new()),
                description: Some("Conforms to the approved type.".to_string()),
                place: Some("Ankara".to_string()),
            },
            rows,
        }
    }

    fn layout(template: &TemplateRecord) -> PageLayout {
        lay_out_page(
            "WF0TEST123",
            template,
            "01.02.2026",
            AssetAvailability::default(),
            &LayoutConfig::default(),
        )
    }

    #[test]
    fn test_wrap_short_text_single_line() {
        let lines = wrap_text("Engine type", 60.0, 8.5);
        assert_eq!(lines, vec!["Engine type".to_string()]);
    }

    #[test]
    fn test_wrap_splits_on_width() {
        let lines = wrap_text("aaaa bbbb cccc dddd", 7.0, 8.5);
        // ~4 chars per line at this width
        assert!(lines.len() >= 4);
        for line in &lines {
            assert!(line.chars().count() <= 4);
        }
    }

    #[test]
    fn test_wrap_hard_breaks_oversized_word() {
        let lines = wrap_text("abcdefghij", 7.0, 8.5);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "abcdefghij");
    }

    #[test]
    fn test_wrap_empty_is_one_empty_line() {
        assert_eq!(wrap_text("", 60.0, 8.5), vec![String::new()]);
    }

    #[test]
    fn test_wrap_honors_embedded_newlines() {
        let lines = wrap_text("line one\nline two", 140.0, 8.5);
        assert_eq!(lines, vec!["line one".to_string(), "line two".to_string()]);
    }

    #[test]
    fn test_zero_rows_header_only() {
        let template = bare_template(vec![]);
        let page = layout(&template);

        let texts: Vec<&str> = page.texts().map(|(t, _, _)| t).collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], PAGE_TITLE);
        assert_eq!(texts[1], "Chassis No: WF0TEST123");
        assert!(!page.texts().any(|(t, _, _)| t.starts_with("Place:")));
        // the divider is always drawn
        assert!(matches!(page.elements.last(), Some(Element::Rule { .. })));
    }

    #[test]
    fn test_zero_rows_with_commitment() {
        let mut template = bare_template(vec![]);
        template.identity.commitment = Some("We certify conformity.".to_string());
        let page = layout(&template);

        assert!(page.texts().any(|(t, _, _)| t == "We certify conformity."));
        assert!(!page.texts().any(|(t, _, _)| t.starts_with("Place:")));
    }

    #[test]
    fn test_vin_substituted_for_marker_row() {
        let template = bare_template(vec![row(1, "1", "Chassis number", "ignored")]);
        let page = layout(&template);

        assert!(page.texts().any(|(t, _, _)| t == ": WF0TEST123"));
        assert!(!page.texts().any(|(t, _, _)| t.contains("ignored")));
    }

    #[test]
    fn test_marker_row_emits_block_once() {
        let template = bare_template(vec![
            row(1, "1", "Chassis", ""),
            row(2, "1.", "Chassis again", ""),
            row(3, "2", "Category", "M1"),
        ]);
        let page = layout(&template);

        let signoffs: Vec<&str> = page
            .texts()
            .map(|(t, _, _)| t)
            .filter(|t| t.starts_with("Place:"))
            .collect();
        assert_eq!(signoffs, vec!["Place: Ankara | Date: 01.02.2026"]);
    }

    #[test]
    fn test_overflow_resets_to_header_bottom_in_right_column() {
        let config = LayoutConfig::default();
        let rows: Vec<TechnicalRow> = (0..40)
            .map(|i| row(i, &format!("0.{i}"), "Prop", "Val"))
            .collect();
        let template = bare_template(rows);
        let page = layout(&template);

        let left_min = page
            .texts()
            .filter(|(_, x, _)| *x == config.margin)
            .map(|(_, _, y)| y)
            .fold(f64::INFINITY, f64::min);
        let right_min = page
            .texts()
            .filter(|(_, x, _)| *x == config.second_column_x)
            .map(|(_, _, y)| y)
            .fold(f64::INFINITY, f64::min);

        assert!(right_min.is_finite(), "no rows reached the right column");
        assert_eq!(left_min, right_min);

        // nothing in the left column sits past the break threshold
        let left_max = page
            .texts()
            .filter(|(_, x, _)| *x == config.margin)
            .map(|(_, _, y)| y)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(left_max <= config.column_break_y + config.line_height);
    }

    #[test]
    fn test_right_column_marker_does_not_trigger_block() {
        // 40 filler rows push the marker row into the right column
        let mut rows: Vec<TechnicalRow> = (0..40)
            .map(|i| row(i, &format!("0.{i}"), "Prop", "Val"))
            .collect();
        rows.push(row(99, "1", "Chassis", ""));
        let template = bare_template(rows);
        let page = lay_out_page(
            "WF0TEST123",
            &template,
            "01.02.2026",
            AssetAvailability {
                logo: false,
                signature: true,
            },
            &LayoutConfig::default(),
        );

        // VIN substitution still happens, the block does not
        assert!(page.texts().any(|(t, _, _)| t == ": WF0TEST123"));
        assert!(!page.texts().any(|(t, _, _)| t.starts_with("Place:")));
        assert!(!page
            .elements
            .iter()
            .any(|e| matches!(e, Element::Signature { .. })));
    }

    #[test]
    fn test_excess_rows_clip_without_panic() {
        let rows: Vec<TechnicalRow> = (0..200)
            .map(|i| row(i, &format!("0.{i}"), "Prop", "Val"))
            .collect();
        let template = bare_template(rows);
        let page = layout(&template);

        // all 200 rows were emitted, the tail simply sits below the page
        let config = LayoutConfig::default();
        assert!(page.texts().any(|(_, _, y)| y > config.page_height));
    }

    #[test]
    fn test_column_switch_happens_at_most_once() {
        let config = LayoutConfig::default();
        let rows: Vec<TechnicalRow> = (0..120)
            .map(|i| row(i, &format!("0.{i}"), "Prop", "Val"))
            .collect();
        let template = bare_template(rows);
        let page = layout(&template);

        let xs: Vec<f64> = page
            .texts()
            .filter(|(t, _, _)| t.starts_with("0."))
            .map(|(_, x, _)| x)
            .collect();
        let switches = xs.windows(2).filter(|w| w[0] != w[1]).count();
        assert_eq!(switches, 1);
        assert_eq!(xs.last().copied(), Some(config.second_column_x));
    }

    #[test]
    fn test_signature_only_with_asset() {
        let template = bare_template(vec![row(1, "1", "Chassis", "")]);
        let without = layout(&template);
        assert!(!without
            .elements
            .iter()
            .any(|e| matches!(e, Element::Signature { .. })));

        let with = lay_out_page(
            "WF0TEST123",
            &template,
            "01.02.2026",
            AssetAvailability {
                logo: true,
                signature: true,
            },
            &LayoutConfig::default(),
        );
        assert!(with
            .elements
            .iter()
            .any(|e| matches!(e, Element::Signature { .. })));
        assert!(with
            .elements
            .iter()
            .any(|e| matches!(e, Element::Logo { .. })));
    }

    #[test]
    fn test_layout_is_deterministic() {
        let template = bare_template(vec![
            row(1, "1", "Chassis", ""),
            row(2, "2", "Category", "M1"),
        ]);
        let a = layout(&template);
        let b = layout(&template);
        assert_eq!(a.elements, b.elements);
    }

    #[test]
    fn test_turkish_text_is_transliterated() {
        let mut template = bare_template(vec![row(2, "2", "Şanzıman", "Düz")]);
        template.identity.commitment = Some("Taahhüt".to_string());
        let page = layout(&template);

        assert!(page.texts().any(|(t, _, _)| t == "Sanziman"));
        assert!(page.texts().any(|(t, _, _)| t == ": Duz"));
        assert!(page.texts().any(|(t, _, _)| t == "Taahhut"));
    }
}
