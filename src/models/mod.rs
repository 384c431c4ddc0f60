use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Label/value pair ──────────────────────────────────────────────────────────

/// One label/value cell pair as found on a detail page, before cleaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelValuePair {
    pub label: Option<String>,
    pub value: String,
}

impl LabelValuePair {
    #[cfg(test)]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            value: value.into(),
        }
    }
}

// ── Wide record ───────────────────────────────────────────────────────────────

/// One ticker pivoted into a single row: cleaned label → cleaned value.
///
/// Columns are kept in sorted label order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideRecord {
    pub ticker: String,
    pub fields: BTreeMap<String, String>,
}

impl WideRecord {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ── Aggregated table ──────────────────────────────────────────────────────────

/// Union of every scraped record, in the order they were pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedTable {
    columns: Vec<String>,
    rows: Vec<WideRecord>,
}

impl AggregatedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, extending the column set with labels not seen yet.
    pub fn push(&mut self, record: WideRecord) {
        for label in record.columns() {
            if !self.columns.iter().any(|c| c == label) {
                self.columns.push(label.to_string());
            }
        }
        self.rows.push(record);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[WideRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of one row aligned to `columns()`; absent labels are empty strings.
    pub fn row_cells<'a>(&'a self, record: &'a WideRecord) -> impl Iterator<Item = &'a str> + 'a {
        self.columns
            .iter()
            .map(move |c| record.get(c).unwrap_or(""))
    }
}

impl FromIterator<WideRecord> for AggregatedTable {
    fn from_iter<I: IntoIterator<Item = WideRecord>>(iter: I) -> Self {
        let mut table = AggregatedTable::new();
        for record in iter {
            table.push(record);
        }
        table
    }
}

impl fmt::Display for AggregatedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index_width = self.rows.len().saturating_sub(1).to_string().len();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .map(|c| {
                self.rows
                    .iter()
                    .map(|r| r.get(c).unwrap_or("").chars().count())
                    .chain(std::iter::once(c.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:index_width$}", "")?;
        for (col, w) in self.columns.iter().zip(widths.iter().copied()) {
            write!(f, "  {:>w$}", col)?;
        }
        writeln!(f)?;

        for (i, row) in self.rows.iter().enumerate() {
            write!(f, "{:<index_width$}", i)?;
            for (cell, w) in self.row_cells(row).zip(widths.iter().copied()) {
                write!(f, "  {:>w$}", cell)?;
            }
            writeln!(f)?;
        }

        write!(f, "\n[{} rows x {} columns]", self.rows.len(), self.columns.len())
    }
}
