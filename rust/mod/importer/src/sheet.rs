//! Spreadsheet input: directory discovery and first-sheet row streams.
//!
//! `.xlsx` sheets are streamed cell by cell from a reader thread through a
//! bounded channel, so memory stays flat however long the sheet is. Legacy
//! `.xls` files have no streaming reader and are loaded as a whole range.
//! Both paths index columns from column A.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};

use calamine::{Data, DataType, Reader, Xlsx, XlsxError, open_workbook, open_workbook_auto};
use chrono::NaiveDateTime;

use crate::error::ImportError;

/// Accepted workbook extensions, compared case-insensitively.
pub const EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// Rows buffered between the `.xlsx` reader thread and the loader.
const ROW_BUFFER: usize = 1024;

/// One spreadsheet cell, reduced to what the cleaner needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) => Cell::Float(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(_) => data
                .as_datetime()
                .map(|dt| Cell::Text(timestamp(dt)))
                .unwrap_or(Cell::Empty),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) | Data::Empty => Cell::Empty,
        }
    }
}

/// Text form stored for date and time cells.
pub fn timestamp(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn header_text(data: &Data) -> String {
    match data {
        Data::String(s) => s.clone(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

type RowIter = Box<dyn Iterator<Item = Result<Vec<Cell>, ImportError>>>;

/// The first worksheet of a workbook: a header row and a stream of data rows.
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    /// Number of data rows, when known up front.
    pub total_rows: Option<usize>,
    rows: RowIter,
}

impl std::fmt::Debug for Sheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sheet")
            .field("name", &self.name)
            .field("headers", &self.headers)
            .field("total_rows", &self.total_rows)
            .finish_non_exhaustive()
    }
}

impl Sheet {
    /// Build a sheet from rows already in memory.
    pub fn from_rows(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            headers,
            total_rows: Some(rows.len()),
            rows: Box::new(rows.into_iter().map(Ok)),
        }
    }

    /// Read the first worksheet of an `.xlsx` or `.xls` workbook.
    ///
    /// The first non-empty row is the header row. Data rows are converted
    /// as they are pulled.
    pub fn open(path: &Path) -> Result<Self, ImportError> {
        let is_xlsx = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
        if is_xlsx {
            Self::stream_xlsx(path)
        } else {
            Self::load_range(path)
        }
    }

    fn load_range(path: &Path) -> Result<Self, ImportError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| spreadsheet_err(path, e.to_string()))?;
        let name = workbook.sheet_names().first().cloned().unwrap_or_default();
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::NoWorksheet {
                path: path.to_path_buf(),
            })?
            .map_err(|e| spreadsheet_err(path, e.to_string()))?;

        let (Some((first, _)), Some((last, last_col))) = (range.start(), range.end()) else {
            return Ok(Self {
                name,
                headers: Vec::new(),
                total_rows: Some(0),
                rows: Box::new(std::iter::empty()),
            });
        };
        let headers = (0..=last_col)
            .map(|c| range.get_value((first, c)).map(header_text).unwrap_or_default())
            .collect();
        let rows = (first + 1..=last).map(move |r| {
            Ok((0..=last_col)
                .map(|c| range.get_value((r, c)).map(Cell::from).unwrap_or(Cell::Empty))
                .collect())
        });

        Ok(Self {
            name,
            headers,
            total_rows: Some((last - first) as usize),
            rows: Box::new(rows),
        })
    }

    fn stream_xlsx(path: &Path) -> Result<Self, ImportError> {
        let (tx, rx) = mpsc::sync_channel(ROW_BUFFER);
        let owned = path.to_path_buf();
        std::thread::Builder::new()
            .name("xlsx-reader".into())
            .spawn(move || {
                if let Err(e) = read_cells(&owned, &tx) {
                    let _ = tx.send(Streamed::Failed(e));
                }
            })
            .map_err(|source| ImportError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        match rx.recv() {
            Ok(Streamed::Header {
                name,
                headers,
                total_rows,
            }) => Ok(Self {
                name,
                headers,
                total_rows,
                rows: Box::new(StreamedRows { rx, done: false }),
            }),
            Ok(Streamed::Failed(e)) => Err(e),
            Ok(Streamed::Row(_)) | Err(_) => Err(spreadsheet_err(
                path,
                "reader stopped before the header row".into(),
            )),
        }
    }

    pub fn into_rows(self) -> RowIter {
        self.rows
    }
}

fn spreadsheet_err(path: &Path, message: String) -> ImportError {
    ImportError::Spreadsheet {
        path: path.to_path_buf(),
        message,
    }
}

enum Streamed {
    Header {
        name: String,
        headers: Vec<String>,
        total_rows: Option<usize>,
    },
    Row(Vec<Cell>),
    Failed(ImportError),
}

struct StreamedRows {
    rx: Receiver<Streamed>,
    done: bool,
}

impl Iterator for StreamedRows {
    type Item = Result<Vec<Cell>, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rx.recv() {
            Ok(Streamed::Row(row)) => Some(Ok(row)),
            Ok(Streamed::Failed(e)) => {
                self.done = true;
                Some(Err(e))
            }
            // The reader hangs up after the last row.
            Ok(Streamed::Header { .. }) | Err(_) => {
                self.done = true;
                None
            }
        }
    }
}

/// Groups row-major cells into rows and sends them down the channel.
struct RowAssembler<'a> {
    tx: &'a SyncSender<Streamed>,
    name: String,
    total_rows: Option<usize>,
    width: Option<usize>,
    current: Option<u32>,
    cells: Vec<Data>,
}

impl RowAssembler<'_> {
    /// Returns false once the receiving side is gone.
    fn push(&mut self, (row, col): (u32, u32), value: Data) -> bool {
        if self.current != Some(row) {
            if let Some(prev) = self.current {
                if !self.finish_row() {
                    return false;
                }
                if self.width.is_some() {
                    for _ in prev + 1..row {
                        if !self.send_row() {
                            return false;
                        }
                    }
                }
            }
            self.current = Some(row);
        }
        let col = col as usize;
        if self.cells.len() <= col {
            self.cells.resize(col + 1, Data::Empty);
        }
        self.cells[col] = value;
        true
    }

    fn finish_row(&mut self) -> bool {
        match self.width {
            Some(_) => self.send_row(),
            None => {
                let headers: Vec<String> = self.cells.iter().map(header_text).collect();
                self.width = Some(headers.len());
                self.cells.clear();
                self.tx
                    .send(Streamed::Header {
                        name: std::mem::take(&mut self.name),
                        headers,
                        total_rows: self.total_rows,
                    })
                    .is_ok()
            }
        }
    }

    fn send_row(&mut self) -> bool {
        let width = self.width.unwrap_or_default();
        let row = (0..width)
            .map(|c| self.cells.get(c).map(Cell::from).unwrap_or(Cell::Empty))
            .collect();
        self.cells.clear();
        self.tx.send(Streamed::Row(row)).is_ok()
    }

    fn close(mut self) {
        if self.current.is_some() {
            self.finish_row();
        }
        if self.width.is_none() {
            let _ = self.tx.send(Streamed::Header {
                name: self.name,
                headers: Vec::new(),
                total_rows: Some(0),
            });
        }
    }
}

fn read_cells(path: &Path, tx: &SyncSender<Streamed>) -> Result<(), ImportError> {
    let xlsx_err = |e: XlsxError| spreadsheet_err(path, e.to_string());
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(xlsx_err)?;
    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ImportError::NoWorksheet {
            path: path.to_path_buf(),
        })?;
    let mut reader = workbook.worksheet_cells_reader(&name).map_err(xlsx_err)?;

    let dims = reader.dimensions();
    let total_rows = (dims.end.0 > dims.start.0).then(|| (dims.end.0 - dims.start.0) as usize);
    let mut rows = RowAssembler {
        tx,
        name,
        total_rows,
        width: None,
        current: None,
        cells: Vec::new(),
    };
    while let Some(cell) = reader.next_cell().map_err(xlsx_err)? {
        if !rows.push(cell.get_position(), Data::from(cell.get_value().clone())) {
            return Ok(());
        }
    }
    rows.close();
    Ok(())
}

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Workbook files directly inside `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let io_err = |source| ImportError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_workbook(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
