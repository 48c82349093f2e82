//! Dynamic CSV tables.
//!
//! Every pipeline step reads one or more CSV files whose column sets vary
//! between data vendors and between steps. `Table` keeps the header order
//! and stores cells as strings; numeric and date views are parsed on demand.

pub mod dates;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors raised while reading, writing or addressing a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: tempfile::PersistError,
    },
}

pub type Result<T> = std::result::Result<T, TableError>;

/// An in-memory table with ordered headers and string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Borrowed view of a single row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.table.get(self.index, column)
    }

    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.table.get_f64(self.index, column)
    }
}

/// Non-null statistics for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCompleteness {
    pub column: String,
    pub non_null: usize,
    pub percent: f64,
}

impl Table {
    /// Create an empty table with the given headers.
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Read a CSV file with a header row. Short rows are padded with empty cells.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let width = headers.len();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    /// Write the table to `path`, replacing it atomically.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        self.to_writer(&mut tmp)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|source| TableError::Persist {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Row<'_> {
        Row { table: self, index }
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        (0..self.rows.len()).map(move |index| Row { table: self, index })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Column index or a `MissingColumn` error.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Names from `required` that are not present, in the given order.
    pub fn missing_columns<'n>(&self, required: &[&'n str]) -> Vec<&'n str> {
        required
            .iter()
            .copied()
            .filter(|c| !self.has_column(c))
            .collect()
    }

    /// Cell value; empty cells and unknown columns are `None`.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        let cell = self.rows.get(row)?.get(idx)?;
        if cell.is_empty() {
            None
        } else {
            Some(cell.as_str())
        }
    }

    pub fn get_f64(&self, row: usize, column: &str) -> Option<f64> {
        self.get(row, column).and_then(parse_f64)
    }

    /// Set a cell, adding the column when it does not exist yet.
    pub fn set(&mut self, row: usize, column: &str, value: impl Into<String>) {
        let idx = self.ensure_column(column);
        if let Some(r) = self.rows.get_mut(row) {
            r[idx] = value.into();
        }
    }

    /// Add a column if missing and return its index.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    /// Add (or overwrite) a column with one value per row.
    pub fn put_column(&mut self, name: &str, values: Vec<String>) {
        let idx = self.ensure_column(name);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }

    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Rename columns; pairs whose source column is absent are ignored.
    pub fn rename_columns(&mut self, mapping: &[(&str, &str)]) {
        for (from, to) in mapping {
            if let Some(idx) = self.column_index(from) {
                self.headers[idx] = to.to_string();
            }
        }
    }

    /// Replace all headers in place. Lengths must match.
    pub fn set_headers(&mut self, headers: Vec<String>) {
        debug_assert_eq!(headers.len(), self.headers.len());
        self.headers = headers;
    }

    /// Keep only the listed columns that exist, in the listed order.
    pub fn select(&self, order: &[&str]) -> Table {
        let indices: Vec<usize> = order
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        self.project(&indices)
    }

    /// Keep exactly the listed columns, creating empty ones as needed.
    pub fn select_or_empty(&self, order: &[&str]) -> Table {
        let mut out = Table::new(order.iter().copied());
        for r in 0..self.rows.len() {
            let row = order
                .iter()
                .map(|c| self.get(r, c).unwrap_or_default().to_string())
                .collect();
            out.rows.push(row);
        }
        out
    }

    fn project(&self, indices: &[usize]) -> Table {
        Table {
            headers: indices.iter().map(|&i| self.headers[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Drop spreadsheet index columns (`Unnamed: 0` and friends).
    pub fn drop_unnamed(&mut self) {
        let keep: Vec<usize> = (0..self.headers.len())
            .filter(|&i| !self.headers[i].starts_with("Unnamed"))
            .collect();
        *self = self.project(&keep);
    }

    /// Remove exact duplicate rows, keeping the first. Returns the number removed.
    pub fn drop_duplicates(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen = HashSet::new();
        self.rows.retain(|row| seen.insert(row.clone()));
        before - self.rows.len()
    }

    /// Remove rows missing a value in any of `subset`. Returns the number removed.
    ///
    /// Unknown columns count as missing, matching a failed lookup.
    pub fn drop_missing(&mut self, subset: &[&str]) -> usize {
        let indices: Vec<Option<usize>> = subset.iter().map(|c| self.column_index(c)).collect();
        let before = self.rows.len();
        self.rows.retain(|row| {
            indices
                .iter()
                .all(|idx| idx.map(|i| !row[i].is_empty()).unwrap_or(false))
        });
        before - self.rows.len()
    }

    /// Keep rows for which `pred` returns true.
    pub fn filter<F>(&self, mut pred: F) -> Table
    where
        F: FnMut(Row<'_>) -> bool,
    {
        let rows = (0..self.rows.len())
            .filter(|&i| pred(self.row(i)))
            .map(|i| self.rows[i].clone())
            .collect();
        Table {
            headers: self.headers.clone(),
            rows,
        }
    }

    pub fn column_f64(&self, name: &str) -> Vec<Option<f64>> {
        (0..self.rows.len()).map(|r| self.get_f64(r, name)).collect()
    }

    pub fn column_str(&self, name: &str) -> Vec<Option<&str>> {
        (0..self.rows.len()).map(|r| self.get(r, name)).collect()
    }

    /// Apply `f` to every non-empty cell of a column.
    pub fn map_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&str) -> String,
    {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                if !row[idx].is_empty() {
                    row[idx] = f(&row[idx]);
                }
            }
        }
    }

    /// Number of empty cells in a column (all rows when the column is absent).
    pub fn missing_count(&self, name: &str) -> usize {
        match self.column_index(name) {
            Some(idx) => self.rows.iter().filter(|r| r[idx].is_empty()).count(),
            None => self.rows.len(),
        }
    }

    pub fn completeness(&self) -> Vec<ColumnCompleteness> {
        let total = self.rows.len();
        self.headers
            .iter()
            .map(|h| {
                let non_null = total - self.missing_count(h);
                let percent = if total == 0 {
                    0.0
                } else {
                    non_null as f64 / total as f64 * 100.0
                };
                ColumnCompleteness {
                    column: h.clone(),
                    non_null,
                    percent,
                }
            })
            .collect()
    }
}

/// Parse a numeric cell. Non-finite and unparseable values are missing.
pub fn parse_f64(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Round to `decimals` places and render; non-finite values render empty.
pub fn fmt_f64(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return String::new();
    }
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    format!("{:.*}", decimals, rounded)
}

pub fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value.map(|v| fmt_f64(v, decimals)).unwrap_or_default()
}

/// Render without a fixed precision (shortest round-trip form).
pub fn fmt_plain(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => v.to_string(),
        _ => String::new(),
    }
}

/// Round a value the way stored columns are rounded.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
