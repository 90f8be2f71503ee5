// Spreadsheet Decoder: turn an uploaded binary workbook (or CSV) into a
// rectangular cell grid. The first sheet is the only one consumed; the
// observed export format carries a report title on row 1 and the real
// column header on row 2, so anything shorter than 3 rows has no data
// and decodes to an empty grid.
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::debug;

use crate::error::{PipelineError, Result};
use crate::types::{RawCell, RawGrid};

/// Minimum rows for a usable export: title row, header row, one data row.
const MIN_GRID_ROWS: usize = 3;

/// Decode an uploaded tabular file by extension: `.csv` goes through the
/// csv reader, everything else is treated as a binary workbook.
pub fn decode_tabular(name: &str, bytes: &[u8]) -> Result<RawGrid> {
    let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "csv" => decode_csv(name, bytes),
        _ => decode_workbook(name, bytes),
    }
}

/// Decode the first sheet of an xls/xlsx workbook into a `RawGrid`.
/// Malformed input is a `DecodeError` carrying the original filename.
pub fn decode_workbook(name: &str, bytes: &[u8]) -> Result<RawGrid> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor)
        .map_err(|e| PipelineError::decode(name, e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PipelineError::decode(name, "workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| PipelineError::decode(name, e))?;

    let mut grid: RawGrid = Vec::with_capacity(range.height());
    for row in range.rows() {
        grid.push(row.iter().map(convert_cell).collect());
    }
    debug!(
        "decoded {}: sheet `{}`, {} rows x {} cols",
        name,
        sheet_name,
        grid.len(),
        grid.first().map(|r| r.len()).unwrap_or(0)
    );
    Ok(enforce_min_rows(grid))
}

/// Decode a CSV export into the same grid shape as the workbook path,
/// including the title-row-then-header convention.
pub fn decode_csv(name: &str, bytes: &[u8]) -> Result<RawGrid> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(bytes);

    let mut grid: RawGrid = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| PipelineError::decode(name, e))?;
        let row = record
            .iter()
            .map(|f| {
                if f.trim().is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(f.to_string())
                }
            })
            .collect();
        grid.push(row);
    }
    Ok(enforce_min_rows(grid))
}

fn enforce_min_rows(grid: RawGrid) -> RawGrid {
    if grid.len() < MIN_GRID_ROWS {
        Vec::new()
    } else {
        grid
    }
}

fn convert_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        other => RawCell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_with_title_header_and_data_decodes() {
        let bytes = b"Sales Report\nParty Name,Amount\nAlpha Traders,1200\n";
        let grid = decode_csv("sales.csv", bytes).unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1][0].as_text(), "Party Name");
        assert_eq!(grid[2][1].as_text(), "1200");
    }

    #[test]
    fn csv_shorter_than_three_rows_is_empty() {
        let bytes = b"Party Name,Amount\nAlpha Traders,1200\n";
        let grid = decode_csv("short.csv", bytes).unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn malformed_workbook_is_a_decode_error() {
        let err = decode_workbook("junk.xlsx", b"not a workbook").unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
        assert!(err.to_string().contains("junk.xlsx"));
    }

    #[test]
    fn blank_csv_fields_become_empty_cells() {
        let bytes = b"Title\nParty Name,,Amount\nAlpha,,90\n";
        let grid = decode_csv("gaps.csv", bytes).unwrap();
        assert!(grid[1][1].is_empty());
        assert_eq!(grid[1][1].as_text(), "");
    }
}
