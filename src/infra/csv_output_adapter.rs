use csv::WriterBuilder;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tracing::{info, instrument, warn};

use crate::app::ports::{TableOutputPort, WrittenOutput};
use crate::config::{single_byte, Config, GarbageMode};
use crate::constants::{REASON_COLUMN, SOURCE_ROW_COLUMN};
use crate::domain::{GarbageRecord, GarbageSet, Table};
use crate::error::{CleanerError, Result};
use crate::observability::metrics;

pub const CLEAN_TARGET: &str = "clean";
pub const GARBAGE_TARGET: &str = "garbage";
pub const REJECTED_TARGET: &str = "rejected";

/// One output line; absent cells are empty
type Row<'a> = Vec<Cow<'a, str>>;

/// Writes the clean table and garbage set as delimited files.
///
/// Every output is first written to a temporary file beside its destination.
/// Destinations are only replaced once all temporary files are complete.
pub struct CsvOutputAdapter {
    clean_path: PathBuf,
    garbage_path: PathBuf,
    rejected_path: PathBuf,
    mode: GarbageMode,
    delimiter: u8,
}

/// A fully written temporary file waiting to be moved into place
struct StagedOutput {
    target: &'static str,
    path: PathBuf,
    rows: usize,
    file: NamedTempFile,
}

impl CsvOutputAdapter {
    pub fn new(clean_path: PathBuf, garbage_path: PathBuf, rejected_path: PathBuf, mode: GarbageMode, delimiter: u8) -> Self {
        Self {
            clean_path,
            garbage_path,
            rejected_path,
            mode,
            delimiter,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.paths.clean.clone(),
            config.paths.garbage.clone(),
            config.paths.rejected_path(),
            config.output.garbage_mode,
            single_byte(config.output.delimiter, "output.delimiter")?,
        ))
    }

    fn stage(&self, target: &'static str, path: &Path, header: &[String], rows: &[Row<'_>]) -> Result<StagedOutput> {
        let fail = |reason: String| {
            metrics::writer::failure(target);
            CleanerError::Write {
                target,
                path: path.display().to_string(),
                reason,
            }
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| fail(format!("cannot create directory: {e}")))?;

        let mut file = NamedTempFile::new_in(&dir).map_err(|e| fail(format!("cannot create file: {e}")))?;
        {
            let mut writer = WriterBuilder::new()
                .delimiter(self.delimiter)
                .from_writer(file.as_file_mut());
            writer.write_record(header).map_err(|e| fail(e.to_string()))?;
            for row in rows {
                writer
                    .write_record(row.iter().map(|c| c.as_ref()))
                    .map_err(|e| fail(e.to_string()))?;
            }
            writer.flush().map_err(|e| fail(e.to_string()))?;
        }

        Ok(StagedOutput {
            target,
            path: path.to_path_buf(),
            rows: rows.len(),
            file,
        })
    }

    fn persist_all(&self, staged: Vec<StagedOutput>) -> Result<Vec<WrittenOutput>> {
        let mut landed: Vec<(WrittenOutput, Option<TempPath>)> = Vec::with_capacity(staged.len());
        for output in staged {
            let fail = |reason: String| {
                metrics::writer::failure(output.target);
                CleanerError::Write {
                    target: output.target,
                    path: output.path.display().to_string(),
                    reason,
                }
            };

            let backup = match set_aside(&output.path) {
                Ok(backup) => backup,
                Err(e) => {
                    roll_back(landed);
                    return Err(fail(format!("cannot move previous output aside: {e}")));
                }
            };
            if let Err(e) = output.file.persist(&output.path) {
                landed.push((
                    WrittenOutput {
                        target: output.target,
                        path: output.path.clone(),
                        rows: 0,
                    },
                    backup,
                ));
                roll_back(landed);
                return Err(fail(e.error.to_string()));
            }

            metrics::writer::rows_written(output.target, output.rows);
            info!("Wrote {} rows to {} ({})", output.rows, output.path.display(), output.target);
            landed.push((
                WrittenOutput {
                    target: output.target,
                    path: output.path,
                    rows: output.rows,
                },
                backup,
            ));
        }
        Ok(landed.into_iter().map(|(written, _)| written).collect())
    }
}

/// Move an existing file at `path` to a temporary name in the same directory.
/// The backup is deleted when the returned handle drops.
fn set_aside(path: &Path) -> std::io::Result<Option<TempPath>> {
    if !path.is_file() {
        return Ok(None);
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let backup = NamedTempFile::new_in(dir)?.into_temp_path();
    fs::rename(path, &backup)?;
    Ok(Some(backup))
}

/// Undo landed outputs newest first: put back what they replaced, or remove them
fn roll_back(landed: Vec<(WrittenOutput, Option<TempPath>)>) {
    for (written, backup) in landed.into_iter().rev() {
        let restored = match &backup {
            Some(previous) => fs::rename(previous, &written.path),
            None if written.path.is_file() => fs::remove_file(&written.path),
            None => Ok(()),
        };
        if let Err(e) = restored {
            warn!("Could not roll back {}: {}", written.path.display(), e);
        }
    }
}

impl TableOutputPort for CsvOutputAdapter {
    #[instrument(skip_all, fields(clean_rows = clean.len(), garbage_records = garbage.len()))]
    fn write_outputs(&self, clean: &Table, garbage: &GarbageSet) -> Result<Vec<WrittenOutput>> {
        let clean_rows: Vec<Row<'_>> = clean
            .rows()
            .iter()
            .map(|r| r.cells.iter().map(|c| cell(c.as_deref())).collect())
            .collect();

        let mut staged = vec![self.stage(CLEAN_TARGET, &self.clean_path, clean.columns(), &clean_rows)?];

        match self.mode {
            GarbageMode::Combined => {
                let records: Vec<&GarbageRecord> = garbage.records().iter().collect();
                let (header, rows) = tagged_rows(&records, &[]);
                staged.push(self.stage(GARBAGE_TARGET, &self.garbage_path, &header, &rows)?);
            }
            GarbageMode::Split => {
                let (dropped, rejected): (Vec<&GarbageRecord>, Vec<&GarbageRecord>) =
                    garbage.records().iter().partition(|r| !r.reason.is_row_rejection());

                let (header, rows) = plain_rows(&dropped);
                staged.push(self.stage(GARBAGE_TARGET, &self.garbage_path, &header, &rows)?);

                let (header, rows) = tagged_rows(&rejected, clean.columns());
                staged.push(self.stage(REJECTED_TARGET, &self.rejected_path, &header, &rows)?);
            }
        }

        self.persist_all(staged)
    }
}

fn cell(value: Option<&str>) -> Cow<'_, str> {
    Cow::Borrowed(value.unwrap_or(""))
}

/// A field position: its label and how many earlier fields of the same
/// record carry that label
type Slot = (String, usize);

fn slots<'a, I>(labels: I) -> Vec<Slot>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    labels
        .into_iter()
        .map(|label| {
            let n = counts.entry(label.as_str()).or_insert(0);
            let slot = (label.clone(), *n);
            *n += 1;
            slot
        })
        .collect()
}

/// Union of field slots in first-seen order, seeded with `seed`.
/// Repeated labels within one record keep separate slots.
fn union_slots(records: &[&GarbageRecord], seed: &[String]) -> Vec<Slot> {
    let mut union: Vec<Slot> = Vec::new();
    let mut known: HashSet<Slot> = HashSet::new();
    let per_record = records.iter().map(|r| slots(r.fields.iter().map(|(l, _)| l)));
    for slot in std::iter::once(slots(seed)).chain(per_record).flatten() {
        if known.insert(slot.clone()) {
            union.push(slot);
        }
    }
    union
}

/// Lay out records on shared slots; absent fields become empty cells
fn layout<'a>(records: &[&'a GarbageRecord], union: &[Slot]) -> Vec<Row<'a>> {
    let index: HashMap<&Slot, usize> = union.iter().enumerate().map(|(i, s)| (s, i)).collect();
    records
        .iter()
        .map(|&r| {
            let mut row: Vec<Option<&'a str>> = vec![None; union.len()];
            let record_slots = slots(r.fields.iter().map(|(l, _)| l));
            for (slot, (_, value)) in record_slots.iter().zip(&r.fields) {
                if let Some(&i) = index.get(slot) {
                    row[i] = value.as_deref();
                }
            }
            row.into_iter().map(cell).collect()
        })
        .collect()
}

fn header(union: Vec<Slot>) -> Vec<String> {
    union.into_iter().map(|(label, _)| label).collect()
}

fn plain_rows<'a>(records: &[&'a GarbageRecord]) -> (Vec<String>, Vec<Row<'a>>) {
    let union = union_slots(records, &[]);
    let rows = layout(records, &union);
    (header(union), rows)
}

/// Rows prefixed with `reason` and `source_row`
fn tagged_rows<'a>(records: &[&'a GarbageRecord], seed: &[String]) -> (Vec<String>, Vec<Row<'a>>) {
    let union = union_slots(records, seed);
    let body = layout(records, &union);

    let mut labels = vec![REASON_COLUMN.to_string(), SOURCE_ROW_COLUMN.to_string()];
    labels.extend(header(union));

    let rows = records
        .iter()
        .zip(body)
        .map(|(record, cells)| {
            let mut row = Vec::with_capacity(cells.len() + 2);
            row.push(Cow::Borrowed(record.reason.as_str()));
            row.push(Cow::Owned(record.source_row.to_string()));
            row.extend(cells);
            row
        })
        .collect();
    (labels, rows)
}
