//! Output side of a run: working directories and the CSV export.

use crate::models::AggregatedTable;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::info;

pub fn create_dirs(dirs: &[&Path]) -> Result<()> {
    for dir in dirs {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create dir {:?}", dir))?;
    }
    Ok(())
}

/// Write the table to `path`: header row, one line per ticker, no index column.
pub fn export_csv(table: &AggregatedTable, path: &Path) -> Result<()> {
    info!("Exporting {} rows to {:?}", table.len(), path);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create dir {:?}", parent))?;
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    write_csv(table, file).with_context(|| format!("Failed to write {:?}", path))
}

pub fn write_csv<W: Write>(table: &AggregatedTable, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    // csv would emit `""` for a zero-field header.
    if !table.columns().is_empty() {
        writer.write_record(table.columns())?;
    }
    for row in table.rows() {
        writer.write_record(table.row_cells(row))?;
    }

    writer.flush()?;
    Ok(())
}
