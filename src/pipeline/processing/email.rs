use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::config::{MissingColumnPolicy, SchemaMapping};
use crate::domain::{GarbageReason, GarbageSet, Table};
use crate::error::{CleanerError, Result};
use crate::observability::metrics;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.+-]+@[A-Za-z0-9-]+\.[A-Za-z0-9.-]+$").expect("valid regex")
});

/// Full-string email check. The local part must also carry at least one
/// ASCII letter or digit, so locals made only of `._+-` are rejected.
pub fn is_valid_email(value: &str) -> bool {
    if !EMAIL_PATTERN.is_match(value) {
        return false;
    }
    value
        .split_once('@')
        .map(|(local, _)| local.bytes().any(|b| b.is_ascii_alphanumeric()))
        .unwrap_or(false)
}

/// Remove rows whose email fails validation; they go to garbage whole.
/// Returns the number of rejected rows.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn filter_invalid_emails(
    table: &mut Table,
    garbage: &mut GarbageSet,
    schema: &SchemaMapping,
) -> Result<usize> {
    let column = schema.email.as_str();
    if !table.has_column(column) {
        match schema.on_missing_column {
            MissingColumnPolicy::Fail => {
                return Err(CleanerError::Schema {
                    stage: "email validation",
                    missing: vec![column.to_string()],
                });
            }
            MissingColumnPolicy::Empty => {
                warn!("Column '{}' absent; every row counts as an invalid email", column);
            }
        }
    }

    let rejected = table.retain_rows(|t, row| t.value(row, column).map(is_valid_email).unwrap_or(false));
    let count = rejected.len();
    garbage.extend_rejected(GarbageReason::InvalidEmail, table, rejected);

    metrics::cleaning::email_rejected(count);
    info!("Rejected {} rows with invalid emails; {} remain", count, table.len());
    Ok(count)
}
