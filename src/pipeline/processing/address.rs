use tracing::{info, instrument, warn};

use crate::config::{MissingColumnPolicy, SchemaMapping};
use crate::domain::{GarbageReason, GarbageRecord, GarbageSet, Table};
use crate::error::{CleanerError, Result};
use crate::observability::metrics;

const SEPARATOR: &str = ", ";

/// Summary of one address merge pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressMergeOutcome {
    pub merged_rows: usize,
    /// Columns moved out of the working table, in garbage order
    pub dropped_columns: Vec<String>,
    /// Expected columns that were not present
    pub absent_columns: Vec<String>,
}

/// Join address parts with `", "`, skipping empty parts, and strip any
/// separator characters left at either end.
pub fn join_address<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let joined = parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    joined.trim_matches(|c| c == ',' || c == ' ').to_string()
}

/// Build the full address column, then move the address sources and the
/// side columns into the garbage set, one `ColumnsDropped` record per row.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn merge_addresses(
    table: &mut Table,
    garbage: &mut GarbageSet,
    schema: &SchemaMapping,
) -> Result<AddressMergeOutcome> {
    let sources = schema.address_columns();
    let dropped = schema.dropped_columns();

    let absent = table.missing_columns(&dropped);
    if !absent.is_empty() {
        match schema.on_missing_column {
            MissingColumnPolicy::Fail => {
                return Err(CleanerError::Schema {
                    stage: "address merge",
                    missing: absent,
                });
            }
            MissingColumnPolicy::Empty => {
                warn!("Treating absent columns as empty: {}", absent.join(", "));
            }
        }
    }

    let all_sources_absent = sources.iter().all(|c| !table.has_column(c));
    let merged_rows = if all_sources_absent && table.has_column(&schema.full_address) {
        info!("No address source columns present; keeping existing '{}'", schema.full_address);
        0
    } else {
        table.set_column(&schema.full_address, |t, row| {
            let full = join_address(sources.iter().map(|c| t.value(row, c)));
            if full.is_empty() {
                None
            } else {
                Some(full)
            }
        });
        table.len()
    };
    metrics::cleaning::rows_merged(merged_rows);

    let taken = table.take_columns(&dropped);
    for row in taken.rows() {
        let fields = dropped
            .iter()
            .map(|label| (label.clone(), taken.value(row, label).map(str::to_string)))
            .collect();
        garbage.push(GarbageRecord {
            reason: GarbageReason::ColumnsDropped,
            source_row: row.source_row,
            fields,
        });
    }

    info!(
        "Merged addresses for {} rows; moved {} columns to garbage",
        merged_rows,
        taken.columns().len()
    );

    Ok(AddressMergeOutcome {
        merged_rows,
        dropped_columns: dropped,
        absent_columns: absent,
    })
}
