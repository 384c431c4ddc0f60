//! Ticker list loader (comma-delimited file with a `Ticker` column).

use anyhow::{Context, Result, bail};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub fn load_tickers(path: &Path, column: &str) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open ticker list {:?}", path))?;
    let tickers = read_tickers(file, column)
        .with_context(|| format!("Failed to read ticker list {:?}", path))?;
    info!("{} tickers loaded from {:?}", tickers.len(), path);
    Ok(tickers)
}

/// Read the `column` values in file order. Blank cells are skipped.
pub fn read_tickers<R: Read>(input: R, column: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let Some(idx) = reader.headers()?.iter().position(|h| h.trim() == column) else {
        bail!("No `{}` column in ticker list", column);
    };

    let mut tickers = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Row {}", i + 1))?;
        match record.get(idx).map(str::trim) {
            Some(t) if !t.is_empty() => tickers.push(t.to_string()),
            _ => debug!("Row {}: no ticker", i + 1),
        }
    }
    Ok(tickers)
}
