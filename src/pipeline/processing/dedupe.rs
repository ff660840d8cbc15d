use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::config::{MissingColumnPolicy, SchemaMapping};
use crate::domain::{GarbageReason, GarbageSet, Table};
use crate::error::{CleanerError, Result};
use crate::observability::metrics;

/// Fingerprint of a composite key. Cells are taken verbatim.
///
/// Each cell is tagged as absent or length-prefixed, so no value can run into
/// its neighbour and an absent cell never equals an empty one.
pub fn compute_key_fingerprint<'a, I>(cells: I) -> [u8; 32]
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut hasher = Sha256::new();
    for cell in cells {
        match cell {
            None => hasher.update([0u8]),
            Some(value) => {
                hasher.update([1u8]);
                hasher.update((value.len() as u64).to_be_bytes());
                hasher.update(value.as_bytes());
            }
        }
    }
    hasher.finalize().into()
}

/// Keep the first row for each composite key; later rows go to garbage.
/// Returns the number of duplicates removed.
#[instrument(skip_all, fields(rows = table.len(), key = ?schema.dedupe_key))]
pub fn remove_duplicates(
    table: &mut Table,
    garbage: &mut GarbageSet,
    schema: &SchemaMapping,
) -> Result<usize> {
    let key = &schema.dedupe_key;
    let absent = table.missing_columns(key);
    if !absent.is_empty() {
        match schema.on_missing_column {
            MissingColumnPolicy::Fail => {
                return Err(CleanerError::Schema {
                    stage: "deduplication",
                    missing: absent,
                });
            }
            MissingColumnPolicy::Empty => {
                warn!("Key columns absent, compared as empty: {}", absent.join(", "));
            }
        }
    }

    let mut seen: HashSet<[u8; 32]> = HashSet::with_capacity(table.len());
    let duplicates = table.retain_rows(|t, row| {
        let fingerprint = compute_key_fingerprint(key.iter().map(|c| t.value(row, c)));
        let first = seen.insert(fingerprint);
        if !first {
            debug!(row = row.source_row, key = %hex::encode(&fingerprint[..8]), "Duplicate row");
        }
        first
    });

    let count = duplicates.len();
    garbage.extend_rejected(GarbageReason::Duplicate, table, duplicates);

    metrics::cleaning::duplicates_rejected(count);
    info!("Removed {} duplicate rows; {} unique remain", count, table.len());
    Ok(count)
}
