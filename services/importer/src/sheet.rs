//! Spreadsheet Reader
//!
//! Loads the first sheet of a workbook (xlsx, xls, xlsb, ods via calamine) or a
//! CSV export into a rectangular grid. Row 0 is the header row.

use crate::error::SheetError;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods", "csv"];

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Text rendering; integral numbers print without a fractional part
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => format!("{}", n),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            other => Cell::Text(format!("{}", other)),
        }
    }
}

/// Row-major cell grid; short rows are padded with `Cell::Empty`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Cell::Empty);
                r
            })
            .collect();
        Self { rows, width }
    }

    /// Convenience for building grids out of literal text
    pub fn from_text_rows(rows: &[&[&str]]) -> Self {
        Self::from_rows(
            rows.iter()
                .map(|r| {
                    r.iter()
                        .map(|s| {
                            if s.is_empty() {
                                Cell::Empty
                            } else {
                                Cell::Text(s.to_string())
                            }
                        })
                        .collect()
                })
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&Cell::Empty)
    }

    /// Owned copy of one column, row 0 included
    pub fn column(&self, column: usize) -> Vec<Cell> {
        (0..self.height())
            .map(|row| self.cell(row, column).clone())
            .collect()
    }
}

/// Read the first sheet of `path`
pub fn read_grid(path: &Path) -> Result<Grid, SheetError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        read_csv(path)
    } else {
        read_workbook(path)
    }
}

fn read_workbook(path: &Path) -> Result<Grid, SheetError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| SheetError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| SheetError::NoSheets {
            path: path.to_path_buf(),
        })?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| SheetError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    tracing::debug!(
        file = %path.display(),
        sheet = %sheet_name,
        rows = range.height(),
        columns = range.width(),
        "read workbook"
    );

    // calamine ranges start at the first used cell; keep absolute coordinates
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(Cell::from));
        rows.push(cells);
    }
    Ok(Grid::from_rows(rows))
}

fn read_csv(path: &Path) -> Result<Grid, SheetError> {
    let bytes = std::fs::read(path).map_err(|source| SheetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let content = decode(&bytes);
    parse_csv(&content).map_err(|source| SheetError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// UTF-8 (BOM stripped), falling back to Windows-1252 for legacy exports
fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.strip_prefix('\u{feff}').unwrap_or(s).to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

fn parse_csv(content: &str) -> Result<Grid, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(Grid::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_csv_grid_is_rectangular() {
        let grid = parse_csv("A,B,C\nx\ny,z\n").unwrap();
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.cell(1, 2), &Cell::Empty);
        assert_eq!(grid.cell(2, 1), &Cell::Text("z".into()));
    }

    #[test]
    fn test_csv_quoted_header_keeps_commas() {
        let grid = parse_csv("\"College A, City, State\",\"College B, Town\"\nOPEN,OPEN\n").unwrap();
        assert_eq!(grid.cell(0, 0), &Cell::Text("College A, City, State".into()));
        assert_eq!(grid.column(1).len(), 2);
    }

    #[test]
    fn test_read_csv_file_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AIQ_2023_R1.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all("\u{feff}\"College, City\"\nOPEN\n".as_bytes()).unwrap();

        let grid = read_grid(&path).unwrap();
        assert_eq!(grid.cell(0, 0), &Cell::Text("College, City".into()));
    }

    #[test]
    fn test_read_csv_windows_1252_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        // "Sé" in Windows-1252
        std::fs::write(&path, [0x53, 0xE9, b'\n']).unwrap();

        let grid = read_grid(&path).unwrap();
        assert_eq!(grid.cell(0, 0), &Cell::Text("Sé".into()));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_grid(&dir.path().join("nope.csv")).is_err());
        assert!(read_grid(&dir.path().join("nope.xlsx")).is_err());
    }

    #[test]
    fn test_number_cells_render_as_integers() {
        assert_eq!(Cell::Number(10248.0).as_text(), "10248");
        assert_eq!(Cell::Number(12.5).as_text(), "12.5");
        assert!(Cell::Text("   ".into()).is_empty());
    }
}
