//! Spreadsheet import: header location, row reconciliation, file front-ends.
//!
//! Both xlsx and csv files are decoded into an untyped 2-D grid of cell
//! strings; header location and reconciliation run on the grid and never
//! touch the file format again.

use calamine::{open_workbook, Data, Reader, Xlsx};
use csv::ReaderBuilder;
use std::path::Path;

use crate::db::{Store, VocabRecord};
use crate::error::{ImportError, Result};

/// Untyped cell grid, one `Vec<String>` per spreadsheet row.
pub type Grid = Vec<Vec<String>>;

/// Resolved header row and column positions for the five required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMap {
    pub header_row: usize,
    pub deutsch: usize,
    pub japanisch: usize,
    pub kanji: usize,
    pub romaji: usize,
    pub lesson: usize,
}

/// Scan rows top-to-bottom for the first one containing both "deutsch" and
/// "japanisch" (trimmed, lowercased, whole-cell match). That row must also
/// resolve kanji, romaji and lesson columns; if it cannot, the whole sheet is
/// rejected rather than scanning on. Strict all-or-nothing, not best-effort.
pub fn locate_header(grid: &[Vec<String>]) -> Option<HeaderMap> {
    for (row_index, row) in grid.iter().enumerate() {
        let normalized: Vec<String> = row.iter().map(|cell| cell.trim().to_lowercase()).collect();
        let position = |name: &str| normalized.iter().position(|cell| cell == name);

        let (deutsch, japanisch) = match (position("deutsch"), position("japanisch")) {
            (Some(d), Some(j)) => (d, j),
            _ => continue,
        };

        let kanji = position("kanji");
        let romaji = position("romaji/lautschrift").or_else(|| position("romaji"));
        let lesson = ["lektion", "lesson", "domain", "thema", "topic"]
            .iter()
            .find_map(|name| position(name));

        return match (kanji, romaji, lesson) {
            (Some(kanji), Some(romaji), Some(lesson)) => Some(HeaderMap {
                header_row: row_index,
                deutsch,
                japanisch,
                kanji,
                romaji,
                lesson,
            }),
            _ => None,
        };
    }

    None
}

/// Validate the data rows after a located header and turn them into records.
///
/// Iteration rules:
/// - a row with both primary fields empty ends the data region; nothing
///   after it is inspected
/// - a row with exactly one primary field empty is skipped as noise
/// - a row missing kanji, romaji or lesson is recorded as a diagnostic
///   (1-based sheet row number) and excluded, but iteration continues
///
/// Any diagnostic rejects the whole import; so does an empty accepted set.
pub fn reconcile(grid: &[Vec<String>], header: &HeaderMap) -> std::result::Result<Vec<VocabRecord>, ImportError> {
    let mut records = Vec::new();
    let mut missing_rows = Vec::new();

    for (row_index, row) in grid.iter().enumerate().skip(header.header_row + 1) {
        let source_text = cell(row, header.deutsch);
        let target_kana = cell(row, header.japanisch);

        if source_text.is_empty() && target_kana.is_empty() {
            break;
        }
        if source_text.is_empty() || target_kana.is_empty() {
            continue;
        }

        let target_kanji = cell(row, header.kanji);
        let target_romaji = cell(row, header.romaji);
        let lesson_or_domain = cell(row, header.lesson);

        if target_kanji.is_empty() || target_romaji.is_empty() || lesson_or_domain.is_empty() {
            missing_rows.push(row_index + 1);
            continue;
        }

        records.push(VocabRecord {
            source_text,
            target_kana,
            target_kanji,
            target_romaji,
            lesson_or_domain,
            // Row order within the source determines insertion order.
            order_index: (row_index - header.header_row) as i64,
        });
    }

    if !missing_rows.is_empty() {
        log::warn!("import rejected: {} rows with missing required values", missing_rows.len());
        return Err(ImportError::MissingFields(missing_rows));
    }
    if records.is_empty() {
        return Err(ImportError::Empty);
    }

    Ok(records)
}

/// Locate a header across all grids of a workbook and reconcile the first
/// sheet that yields one. Each sheet is tried independently.
pub fn reconcile_workbook(grids: &[Grid]) -> std::result::Result<Vec<VocabRecord>, ImportError> {
    for grid in grids {
        if let Some(header) = locate_header(grid) {
            return reconcile(grid, &header);
        }
    }
    Err(ImportError::HeaderNotFound)
}

/// Parse a file (xlsx or csv), reconcile its rows and upsert the accepted
/// batch atomically. Returns the number of imported records.
pub fn import_file(store: &mut Store, file_path: impl AsRef<Path>) -> Result<usize> {
    let path = file_path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let grids = match extension.as_str() {
        "xlsx" => read_xlsx_grids(path)?,
        "csv" => vec![read_csv_grid(path)?],
        _ => return Err(ImportError::UnsupportedFormat(extension).into()),
    };

    let records = reconcile_workbook(&grids)?;
    store.upsert_batch(&records)
}

/// Decode every sheet of an xlsx workbook into a grid, in sheet order.
pub fn read_xlsx_grids(path: &Path) -> Result<Vec<Grid>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names = workbook.sheet_names().to_owned();

    let mut grids = Vec::with_capacity(sheet_names.len());
    for sheet_name in sheet_names {
        let range = workbook.worksheet_range(&sheet_name)?;
        let grid: Grid = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        grids.push(grid);
    }

    Ok(grids)
}

/// Decode a csv file into a single grid. The header row is located by
/// scanning like any other sheet, so leading preamble rows are fine.
pub fn read_csv_grid(path: &Path) -> Result<Grid> {
    let mut reader = ReaderBuilder::new().has_headers(false).flexible(true).from_path(path)?;

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(|field| field.to_string()).collect());
    }

    Ok(grid)
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).map(|value| value.trim().to_string()).unwrap_or_default()
}

/// Untyped cell to display string; numbers and dates are rendered, error
/// and empty cells become "".
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
        Data::Empty => String::new(),
    }
}
