use csv::{ByteRecord, ReaderBuilder, Trim};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::config::{single_byte, LoaderConfig};
use crate::constants::UNNAMED_PREFIX;
use crate::domain::{Record, Table};
use crate::error::{CleanerError, Result};
use crate::observability::metrics;

/// Options for reading the input file
#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    pub delimiter: u8,
    pub trim: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: false,
        }
    }
}

impl TryFrom<&LoaderConfig> for LoaderOptions {
    type Error = CleanerError;

    fn try_from(config: &LoaderConfig) -> Result<Self> {
        Ok(Self {
            delimiter: single_byte(config.delimiter, "loader.delimiter")?,
            trim: config.trim,
        })
    }
}

/// Read a delimited file with a header row into a [`Table`].
///
/// Every cell stays a string; no type inference is attempted.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_table(path: &Path, options: LoaderOptions) -> Result<Table> {
    let file = File::open(path).map_err(|e| {
        metrics::loader::failure();
        load_error(path, format!("cannot open file: {e}"))
    })?;
    let table = read_table(file, options, path)?;
    info!("Loaded {} rows with {} columns", table.len(), table.columns().len());
    Ok(table)
}

/// Read a table from any reader; `source` is only used in error messages
pub fn read_table<R: Read>(input: R, options: LoaderOptions, source: &Path) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(if options.trim { Trim::All } else { Trim::None })
        .from_reader(input);

    let raw_headers: Vec<String> = reader
        .byte_headers()
        .map_err(|e| {
            metrics::loader::failure();
            load_error(source, format!("cannot read header row: {e}"))
        })?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();

    if raw_headers.is_empty() || raw_headers.iter().all(|h| h.is_empty()) {
        metrics::loader::failure();
        return Err(load_error(source, "missing header row".to_string()));
    }

    let columns = name_columns(raw_headers);
    let width = columns.len();
    let mut table = Table::new(columns);

    // One buffer reused for every row
    let mut record = ByteRecord::new();
    let mut overlong_rows = 0usize;
    let mut row_number = 0usize;
    loop {
        let more = reader.read_byte_record(&mut record).map_err(|e| {
            metrics::loader::failure();
            load_error(source, format!("malformed data at row {}: {e}", row_number + 1))
        })?;
        if !more {
            break;
        }
        row_number += 1;

        if record.len() > width {
            overlong_rows += 1;
        }
        let cells = record
            .iter()
            .take(width)
            .map(|cell| {
                if cell.is_empty() {
                    None
                } else {
                    Some(String::from_utf8_lossy(cell).into_owned())
                }
            })
            .collect();
        table.push_row(Record::new(row_number, cells));
    }

    if overlong_rows > 0 {
        warn!("{} rows had more cells than the header; extra cells dropped", overlong_rows);
    }

    if table.is_empty() {
        metrics::loader::failure();
        warn!("Input {} has no data rows", source.display());
        return Err(load_error(source, "no data rows".to_string()));
    }

    metrics::loader::rows_loaded(table.len());
    Ok(table)
}

/// Give blank headers a positional name and make repeated labels distinct
pub fn name_columns(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut named = Vec::with_capacity(raw.len());

    for (idx, label) in raw.into_iter().enumerate() {
        let base = if label.trim().is_empty() {
            format!("{UNNAMED_PREFIX}{idx}")
        } else {
            label
        };

        let mut candidate = base.clone();
        let mut suffix = 0;
        while seen.contains(&candidate) {
            suffix += 1;
            candidate = format!("{base}.{suffix}");
        }
        if candidate != base {
            debug!("Renamed repeated column '{}' to '{}'", base, candidate);
        }
        seen.insert(candidate.clone());
        named.push(candidate);
    }

    named
}

fn load_error(path: &Path, reason: String) -> CleanerError {
    CleanerError::DataLoad {
        path: path.display().to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn read(content: &str) -> Result<Table> {
        read_table(content.as_bytes(), LoaderOptions::default(), &PathBuf::from("inline.csv"))
    }

    #[test]
    fn test_keeps_cells_as_strings() {
        let table = read("ID Number,Email\n007,a@b.com\n1e5,\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(&table.rows()[0], "ID Number"), Some("007"));
        assert_eq!(table.value(&table.rows()[1], "ID Number"), Some("1e5"));
        assert_eq!(table.value(&table.rows()[1], "Email"), None);
        assert_eq!(table.rows()[1].source_row, 2);
    }

    #[test]
    fn test_names_blank_and_repeated_headers() {
        let table = read("a,,a,a\n1,2,3,4\n").unwrap();
        assert_eq!(table.columns(), &["a", "Unnamed: 1", "a.1", "a.2"]);
        assert_eq!(name_columns(vec!["a.1".into(), "a".into(), "a".into()]), vec!["a.1", "a", "a.2"]);
    }

    #[test]
    fn test_pads_short_rows_and_drops_extra_cells() {
        let table = read("a,b\n1\n1,2,3\n").unwrap();
        assert_eq!(table.rows()[0].cells, vec![Some("1".to_string()), None]);
        assert_eq!(table.rows()[1].cells.len(), 2);
    }

    #[test]
    fn test_header_only_file_is_a_load_error() {
        let err = read("a,b\n").unwrap_err();
        assert!(matches!(err, CleanerError::DataLoad { .. }));
        assert!(err.to_string().contains("no data rows"));
    }

    #[test]
    fn test_empty_file_is_a_load_error() {
        assert!(matches!(read(""), Err(CleanerError::DataLoad { .. })));
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let err = load_table(Path::new("/nonexistent/owners.csv"), LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, CleanerError::DataLoad { .. }));
    }

    #[test]
    fn test_loads_from_disk_with_custom_delimiter() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "省份;城市\n北京; 海淀 \n").unwrap();
        let options = LoaderOptions {
            delimiter: b';',
            trim: true,
        };
        let table = load_table(file.path(), options).unwrap();
        assert_eq!(table.columns(), &["省份", "城市"]);
        assert_eq!(table.value(&table.rows()[0], "城市"), Some("海淀"));
    }
}
