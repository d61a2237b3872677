//! Grid loading for usage files.
//!
//! Turns a CSV or XLSX file into the raw cell grid consumed by
//! [`crate::decoder::decode`]. Row 0 of the grid is the file's first
//! non-blank row.

use std::fs::File;
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use tou_core::error::{Result, TouError};
use tou_core::models::Cell;
use tracing::{debug, info};

use crate::dates::excel_serial_to_naive;

// ── Public API ────────────────────────────────────────────────────────────────

/// Load the cell grid of a usage file, picking the parser by extension.
pub fn load_grid(path: &Path) -> Result<Vec<Vec<Cell>>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let grid = match extension.as_deref() {
        Some("csv") => load_csv(path)?,
        Some("xlsx") => load_xlsx(path)?,
        _ => return Err(TouError::UnsupportedFileType(path.to_path_buf())),
    };

    if grid.is_empty() {
        return Err(TouError::NoData(path.to_path_buf()));
    }
    info!(
        "Loaded {} rows from {}",
        grid.len(),
        path.display()
    );
    Ok(grid)
}

/// Read every record of a CSV file as text cells.
///
/// Rows may have differing lengths; blank fields become [`Cell::Empty`].
pub fn load_csv(path: &Path) -> Result<Vec<Vec<Cell>>> {
    let file = File::open(path).map_err(|source| TouError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Vec<Cell> = record.iter().map(Cell::text).collect();
        push_row(&mut grid, row);
    }
    debug!("csv {} yielded {} rows", path.display(), grid.len());
    Ok(grid)
}

/// Read the first worksheet of an XLSX workbook.
pub fn load_xlsx(path: &Path) -> Result<Vec<Vec<Cell>>> {
    if !path.exists() {
        return Err(TouError::FileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    }

    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| TouError::Workbook(format!("{}: {}", path.display(), e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| TouError::NoData(path.to_path_buf()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| TouError::Workbook(format!("sheet {}: {}", sheet_name, e)))?;

    let mut grid = Vec::new();
    for row in range.rows() {
        push_row(&mut grid, row.iter().map(cell_from_data).collect());
    }
    debug!(
        "worksheet {:?} of {} yielded {} rows",
        sheet_name,
        path.display(),
        grid.len()
    );
    Ok(grid)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn push_row(grid: &mut Vec<Vec<Cell>>, row: Vec<Cell>) {
    if row.iter().all(|c| matches!(c, Cell::Empty)) {
        return;
    }
    grid.push(row);
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::text(s.as_str()),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => excel_serial_to_naive(dt.as_f64())
            .map(Cell::DateTime)
            .unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.as_str()),
        Data::Error(_) | Data::Empty => Cell::Empty,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
