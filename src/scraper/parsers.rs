use crate::models::LabelValuePair;
use ::scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::error::ParseError;

// ── Selectors ─────────────────────────────────────────────────────────────────

/// Fundamentals tables on the detail page. The last one is a footer.
const DATA_TABLE: &str = "table.w728";
const ROW: &str = "tr";
const CELL: &str = "td";
/// Inline text holder inside label cells (and most value cells).
const TEXT_SPAN: &str = "span.txt";

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

// ── Detail page ───────────────────────────────────────────────────────────────

/// What to do when a label cell has no `span.txt`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingLabel {
    /// Fail the whole page.
    #[default]
    Fail,
    /// Drop that pair and keep going.
    Skip,
}

/// Extract label/value pairs from a detail page, in document order.
///
/// Every `table.w728` except the last is scanned. Each row yields a pair from
/// cells 0/1 when it has at least two cells, and another from cells 2/3 when it
/// has at least four.
pub fn parse_detail_page(
    html: &str,
    on_missing: MissingLabel,
) -> Result<Vec<LabelValuePair>, ParseError> {
    let doc = Html::parse_document(html);

    let table_sel = selector(DATA_TABLE)?;
    let row_sel = selector(ROW)?;
    let cell_sel = selector(CELL)?;
    let txt_sel = selector(TEXT_SPAN)?;

    let tables: Vec<ElementRef> = doc.select(&table_sel).collect();
    let data_tables = tables.split_last().map(|(_, rest)| rest).unwrap_or(&[]);

    let mut pairs = Vec::new();

    for (t, table) in data_tables.iter().enumerate() {
        for (r, row) in table.select(&row_sel).enumerate() {
            let cells: Vec<ElementRef> = row.select(&cell_sel).collect();

            for first in [0, 2] {
                if cells.len() < first + 2 {
                    break;
                }

                let Some(label) = span_text(&cells[first], &txt_sel) else {
                    let err = ParseError::MissingLabel { table: t, row: r, cell: first };
                    match on_missing {
                        MissingLabel::Fail => return Err(err),
                        MissingLabel::Skip => {
                            warn!("Skipping pair: {}", err);
                            continue;
                        }
                    }
                };

                let value_cell = &cells[first + 1];
                let value = span_text(value_cell, &txt_sel).unwrap_or_else(|| text_of(value_cell));

                pairs.push(LabelValuePair {
                    label: Some(label),
                    value,
                });
            }
        }
    }

    Ok(pairs)
}

fn span_text(cell: &ElementRef, txt_sel: &Selector) -> Option<String> {
    cell.select(txt_sel).next().map(|span| text_of(&span))
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect()
}
