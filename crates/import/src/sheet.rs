use calamine::{open_workbook_auto, Data, Reader};
use cardgen_core::{CardConfig, Row};
use csv::ByteRecord;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Workbook error: {0}")]
    WorkbookError(#[from] calamine::Error),
    #[error("Unsupported input format: '{0}'")]
    UnsupportedFormat(String),
    #[error("Workbook has no worksheets")]
    NoWorksheet,
}

/// The two consulted columns of every row in the first worksheet, in sheet order.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    rows: Vec<Row>,
}

impl Sheet {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Trim a raw cell and map the literal `nan` placeholder to empty.
pub fn normalize_cell(raw: &str) -> String {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("nan") {
        String::new()
    } else {
        s.to_string()
    }
}

/// Render a workbook cell as text. Whole floats lose their `.0` so a zip code
/// stored as a number reads back the way it was typed.
fn cell_text(cell: &Data) -> String {
    let raw = match cell {
        Data::Empty | Data::Error(_) => return String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        other => other.to_string(),
    };
    normalize_cell(&raw)
}

/// CRLF becomes LF and the last line always ends in a newline, so every record
/// consumes exactly one terminator.
fn unix_line_endings(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 1);
    let mut bytes = raw.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        if b == b'\r' && bytes.peek() == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    if !out.is_empty() && !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    out
}

pub struct SheetReader;

impl SheetReader {
    /// Read a delimited export. Records may have any length; undecodable bytes
    /// are replaced rather than failing the row. Empty lines, which the csv
    /// reader skips, come back as blank rows so row indices match the file.
    pub fn read_delimited<R: Read>(
        mut data: R,
        delimiter: u8,
        config: &CardConfig,
    ) -> Result<Sheet, SheetError> {
        let mut raw = Vec::new();
        data.read_to_end(&mut raw)?;
        let buf = unix_line_endings(&raw);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(buf.as_slice());

        let mut rows = Vec::new();
        let mut record = ByteRecord::new();
        loop {
            let before = reader.position().line();
            if !reader.read_byte_record(&mut record)? {
                break;
            }
            // Lines consumed = skipped empty lines + newlines inside quoted
            // fields + the record terminator.
            let spanned = reader.position().line() - before;
            let inner: u64 = record
                .iter()
                .map(|field| field.iter().filter(|&&b| b == b'\n').count() as u64)
                .sum();
            let skipped = spanned.saturating_sub(inner + 1);
            rows.extend((0..skipped).map(|_| Row::default()));

            let cell = |col: usize| {
                record
                    .get(col)
                    .map(|b| normalize_cell(&String::from_utf8_lossy(b)))
                    .unwrap_or_default()
            };
            rows.push(Row::new(cell(config.address_column), cell(config.message_column)));
        }

        Ok(Sheet::from_rows(rows))
    }

    /// Read the first worksheet of an Excel or OpenDocument workbook.
    pub fn read_workbook(path: &Path, config: &CardConfig) -> Result<Sheet, SheetError> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(SheetError::NoWorksheet)??;

        let Some((last_row, _)) = range.end() else {
            return Ok(Sheet::default());
        };

        // Positions are absolute so row indices line up with the spreadsheet even
        // when the used range does not start at A1.
        let cell = |row: u32, col: usize| {
            u32::try_from(col)
                .ok()
                .and_then(|c| range.get_value((row, c)))
                .map(cell_text)
                .unwrap_or_default()
        };

        let rows = (0..=last_row)
            .map(|r| Row::new(cell(r, config.address_column), cell(r, config.message_column)))
            .collect();

        Ok(Sheet::from_rows(rows))
    }

    /// Dispatch on file extension.
    pub fn read_path(path: &Path, config: &CardConfig) -> Result<Sheet, SheetError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match ext.as_str() {
            "csv" => Self::read_delimited(std::fs::File::open(path)?, b',', config),
            "tsv" => Self::read_delimited(std::fs::File::open(path)?, b'\t', config),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Self::read_workbook(path, config),
            other => Err(SheetError::UnsupportedFormat(other.to_string())),
        }
    }
}

pub fn read_sheet(path: &Path, config: &CardConfig) -> Result<Sheet, SheetError> {
    SheetReader::read_path(path, config)
}
