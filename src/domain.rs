//! In-memory shapes shared by every cleaning stage.
//!
//! A [`Table`] owns its column labels and an ordered list of [`Record`]s whose
//! cells line up positionally with those labels. Rejected data never goes back
//! into a table; it is collected as tagged [`GarbageRecord`]s in a
//! [`GarbageSet`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the input. Cells are positional; an empty CSV cell is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based position among the input file's data rows
    pub source_row: usize,
    pub cells: Vec<Option<String>>,
}

impl Record {
    pub fn new(source_row: usize, cells: Vec<Option<String>>) -> Self {
        Self { source_row, cells }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|c| c.as_deref())
    }
}

/// Ordered records sharing one column set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(columns: Vec<String>, rows: Vec<Record>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column carrying `label`
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.column_index(label).is_some()
    }

    /// Labels from `wanted` that this table does not have
    pub fn missing_columns<S: AsRef<str>>(&self, wanted: &[S]) -> Vec<String> {
        wanted
            .iter()
            .map(|w| w.as_ref())
            .filter(|w| !self.has_column(w))
            .map(|w| w.to_string())
            .collect()
    }

    /// Append a row, padding or truncating it to the table width
    pub fn push_row(&mut self, mut record: Record) {
        record.cells.resize(self.columns.len(), None);
        self.rows.push(record);
    }

    /// Replace every label. The new list must be as long as the old one.
    pub fn rename_columns(&mut self, labels: Vec<String>) -> Result<(), String> {
        if labels.len() != self.columns.len() {
            return Err(format!(
                "expected {} labels, got {}",
                self.columns.len(),
                labels.len()
            ));
        }
        self.columns = labels;
        Ok(())
    }

    /// Compute a column from each row. An existing column with the same label
    /// is overwritten in place; otherwise the column is appended.
    pub fn set_column<F>(&mut self, label: &str, mut compute: F)
    where
        F: FnMut(&Table, &Record) -> Option<String>,
    {
        let values: Vec<Option<String>> = self.rows.iter().map(|r| compute(self, r)).collect();
        match self.column_index(label) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.cells[idx] = value;
                }
            }
            None => {
                self.columns.push(label.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.cells.push(value);
                }
            }
        }
    }

    /// Cell value of `record` under `label`
    pub fn value<'a>(&self, record: &'a Record, label: &str) -> Option<&'a str> {
        self.column_index(label).and_then(|idx| record.get(idx))
    }

    /// Remove the named columns that exist and return them as their own table,
    /// in the order requested. Row order and `source_row` are preserved.
    pub fn take_columns<S: AsRef<str>>(&mut self, labels: &[S]) -> Table {
        let picked: Vec<usize> = labels
            .iter()
            .filter_map(|l| self.column_index(l.as_ref()))
            .fold(Vec::new(), |mut acc, idx| {
                if !acc.contains(&idx) {
                    acc.push(idx);
                }
                acc
            });

        let taken_columns = picked.iter().map(|&i| self.columns[i].clone()).collect();
        let taken_rows = self
            .rows
            .iter()
            .map(|r| {
                let cells = picked.iter().map(|&i| r.cells[i].clone()).collect();
                Record::new(r.source_row, cells)
            })
            .collect();

        let keep: Vec<bool> = (0..self.columns.len()).map(|i| !picked.contains(&i)).collect();
        self.columns = retain_by_mask(std::mem::take(&mut self.columns), &keep);
        for row in &mut self.rows {
            row.cells = retain_by_mask(std::mem::take(&mut row.cells), &keep);
        }

        Table {
            columns: taken_columns,
            rows: taken_rows,
        }
    }

    /// Keep rows for which `keep` is true; return the removed rows in order
    pub fn retain_rows<F>(&mut self, mut keep: F) -> Vec<Record>
    where
        F: FnMut(&Table, &Record) -> bool,
    {
        let mut kept = Vec::with_capacity(self.rows.len());
        let mut removed = Vec::new();
        for row in std::mem::take(&mut self.rows) {
            if keep(self, &row) {
                kept.push(row);
            } else {
                removed.push(row);
            }
        }
        self.rows = kept;
        removed
    }

    /// Label/value pairs of a record in column order
    pub fn fields(&self, record: &Record) -> Vec<(String, Option<String>)> {
        self.columns
            .iter()
            .cloned()
            .zip(record.cells.iter().cloned())
            .collect()
    }
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep.iter())
        .filter_map(|(item, &k)| if k { Some(item) } else { None })
        .collect()
}

/// Why a record landed in the garbage set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GarbageReason {
    /// Side columns extracted from a row that itself stays in the working table
    ColumnsDropped,
    InvalidEmail,
    Duplicate,
}

impl GarbageReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            GarbageReason::ColumnsDropped => "columns_dropped",
            GarbageReason::InvalidEmail => "invalid_email",
            GarbageReason::Duplicate => "duplicate",
        }
    }

    /// Whether the whole row was removed from the working table
    pub fn is_row_rejection(&self) -> bool {
        !matches!(self, GarbageReason::ColumnsDropped)
    }
}

impl fmt::Display for GarbageReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GarbageRecord {
    pub reason: GarbageReason,
    pub source_row: usize,
    pub fields: Vec<(String, Option<String>)>,
}

/// Everything excluded from the clean output, in the order it was excluded
#[derive(Debug, Clone, Default)]
pub struct GarbageSet {
    records: Vec<GarbageRecord>,
}

impl GarbageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: GarbageRecord) {
        self.records.push(record);
    }

    /// Add rows that were removed from `table`
    pub fn extend_rejected(&mut self, reason: GarbageReason, table: &Table, rows: Vec<Record>) {
        for row in rows {
            self.push(GarbageRecord {
                reason,
                source_row: row.source_row,
                fields: table.fields(&row),
            });
        }
    }

    pub fn records(&self) -> &[GarbageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, reason: GarbageReason) -> usize {
        self.records.iter().filter(|r| r.reason == reason).count()
    }
}
