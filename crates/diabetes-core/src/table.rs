//! Display tables
//!
//! Uploaded and exported tables are kept as text cells so the user sees
//! exactly what they supplied. Typed values are derived from them by the
//! normalizer, never written back.

use crate::schema::normalize_header;
use crate::{DiabetesError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Delimiter for uploads and exported results
pub const UPLOAD_DELIMITER: u8 = b';';

/// A header row plus text cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DisplayTable {
    pub fn new(headers: Vec<String>) -> Self {
        DisplayTable {
            headers,
            rows: Vec::new(),
        }
    }

    /// Parse delimited text with a required header row
    ///
    /// Cells are trimmed. A row whose width differs from the header is a
    /// parse error, as is a file with no header.
    pub fn from_delimited<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| DiabetesError::UploadParse(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(DiabetesError::UploadParse("missing header row".to_string()));
        }

        let mut table = DisplayTable::new(headers);
        for record in rdr.records() {
            let record = record.map_err(|e| DiabetesError::UploadParse(e.to_string()))?;
            table.rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(table)
    }

    /// Parse a `;`-separated upload
    pub fn from_upload(bytes: &[u8]) -> Result<Self> {
        Self::from_delimited(bytes, UPLOAD_DELIMITER)
    }

    /// Parse a CSV file, guessing `;` or `,` from the header line
    pub fn from_csv_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let header_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
        let delimiter = if header_line.contains(&UPLOAD_DELIMITER) {
            UPLOAD_DELIMITER
        } else {
            b','
        };
        Self::from_delimited(bytes.as_slice(), delimiter)
    }

    /// Read the first worksheet of a spreadsheet; the first row is the header
    pub fn from_spreadsheet(path: &Path) -> Result<Self> {
        use calamine::{open_workbook_auto, Reader};

        let mut workbook = open_workbook_auto(path)
            .map_err(|e| DiabetesError::ReportInvalid(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| DiabetesError::ReportInvalid("workbook has no sheets".to_string()))?
            .map_err(|e| DiabetesError::ReportInvalid(e.to_string()))?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect::<Vec<_>>());

        let headers = rows
            .next()
            .ok_or_else(|| DiabetesError::ReportInvalid("worksheet is empty".to_string()))?;
        let mut table = DisplayTable::new(headers);
        table.rows = rows.filter(|row| row.iter().any(|c| !c.is_empty())).collect();
        Ok(table)
    }

    /// Map every header onto its canonical name (see [`normalize_header`])
    pub fn normalize_headers(&mut self) {
        for header in &mut self.headers {
            *header = normalize_header(header);
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a column; `values` must have one entry per row
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(DiabetesError::Scoring(format!(
                "column has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        self.headers.push(name.into());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Serialize as delimited text with a header row
    pub fn to_delimited(&self, delimiter: u8) -> Result<String> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());
        wtr.write_record(&self.headers)
            .map_err(|e| DiabetesError::Io(e.into()))?;
        for row in &self.rows {
            wtr.write_record(row).map_err(|e| DiabetesError::Io(e.into()))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| DiabetesError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| DiabetesError::UploadParse(e.to_string()))
    }

    /// Write as a `;`-separated file
    ///
    /// The content goes to a temporary file in the target directory which is
    /// then renamed over `path`, so readers see either the old table or the
    /// new one, never a partial write.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let text = self.to_delimited(UPLOAD_DELIMITER)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| DiabetesError::Io(e.error))?;
        Ok(())
    }
}
