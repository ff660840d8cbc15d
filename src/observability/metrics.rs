//! Metrics for the cleaning pipeline.
//!
//! Recording goes through the `metrics` facade. Nothing is exported by this
//! crate; an embedding process that installs a recorder receives the values.

use std::fmt;

/// Enum representing all metric names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Loader
    LoaderRowsLoaded,
    LoaderFailures,

    // Header translation
    TranslationHeadersTranslated,
    TranslationHeadersOverridden,
    TranslationFallbacks,
    TranslationRetries,
    TranslationRequestDuration,

    // Cleaning stages
    AddressRowsMerged,
    EmailRowsRejected,
    DedupeRowsRejected,
    StageDuration,

    // Writer
    WriterRowsWritten,
    WriterFailures,

    RunsCompleted,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::LoaderRowsLoaded => "cleaner_loader_rows_loaded_total",
            MetricName::LoaderFailures => "cleaner_loader_failures_total",

            MetricName::TranslationHeadersTranslated => "cleaner_translation_headers_translated_total",
            MetricName::TranslationHeadersOverridden => "cleaner_translation_headers_overridden_total",
            MetricName::TranslationFallbacks => "cleaner_translation_fallbacks_total",
            MetricName::TranslationRetries => "cleaner_translation_retries_total",
            MetricName::TranslationRequestDuration => "cleaner_translation_request_duration_seconds",

            MetricName::AddressRowsMerged => "cleaner_address_rows_merged_total",
            MetricName::EmailRowsRejected => "cleaner_email_rows_rejected_total",
            MetricName::DedupeRowsRejected => "cleaner_dedupe_rows_rejected_total",
            MetricName::StageDuration => "cleaner_stage_duration_seconds",

            MetricName::WriterRowsWritten => "cleaner_writer_rows_written_total",
            MetricName::WriterFailures => "cleaner_writer_failures_total",

            MetricName::RunsCompleted => "cleaner_runs_completed_total",
        }
    }

    /// Returns (phase, description, unit)
    pub fn metadata(&self) -> (&'static str, &'static str, Option<&'static str>) {
        match self {
            MetricName::LoaderRowsLoaded => ("loader", "Data rows read from input", None),
            MetricName::LoaderFailures => ("loader", "Input files that could not be loaded", None),

            MetricName::TranslationHeadersTranslated => ("translation", "Headers translated by the service", None),
            MetricName::TranslationHeadersOverridden => ("translation", "Headers resolved from overrides", None),
            MetricName::TranslationFallbacks => ("translation", "Headers kept after a failed translation", None),
            MetricName::TranslationRetries => ("translation", "Translation request retries", None),
            MetricName::TranslationRequestDuration => ("translation", "Translation request duration", Some("s")),

            MetricName::AddressRowsMerged => ("address", "Rows given a merged address", None),
            MetricName::EmailRowsRejected => ("email", "Rows rejected for an invalid email", None),
            MetricName::DedupeRowsRejected => ("dedupe", "Rows rejected as duplicates", None),
            MetricName::StageDuration => ("pipeline", "Stage duration by stage", Some("s")),

            MetricName::WriterRowsWritten => ("writer", "Rows written by output", None),
            MetricName::WriterFailures => ("writer", "Failed output writes", None),

            MetricName::RunsCompleted => ("pipeline", "Completed cleaning runs", None),
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            LoaderRowsLoaded,
            LoaderFailures,
            TranslationHeadersTranslated,
            TranslationHeadersOverridden,
            TranslationFallbacks,
            TranslationRetries,
            TranslationRequestDuration,
            AddressRowsMerged,
            EmailRowsRejected,
            DedupeRowsRejected,
            StageDuration,
            WriterRowsWritten,
            WriterFailures,
            RunsCompleted,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Register a description for every metric with the installed recorder.
/// Duration histograms carry a seconds unit.
pub fn describe_metrics() {
    for metric in MetricName::all_metrics() {
        let (_, description, unit) = metric.metadata();
        if unit.is_some() {
            ::metrics::describe_histogram!(metric.as_str(), ::metrics::Unit::Seconds, description);
        } else {
            ::metrics::describe_counter!(metric.as_str(), description);
        }
    }
}

/// Record how long a named stage took
pub fn stage_duration(stage: &'static str, secs: f64) {
    ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
}

pub fn run_completed() {
    ::metrics::counter!(MetricName::RunsCompleted.as_str()).increment(1);
}

// ============================================================================
// Loader Metrics
// ============================================================================

pub mod loader {
    use super::MetricName;

    pub fn rows_loaded(rows: usize) {
        ::metrics::counter!(MetricName::LoaderRowsLoaded.as_str()).increment(rows as u64);
    }

    pub fn failure() {
        ::metrics::counter!(MetricName::LoaderFailures.as_str()).increment(1);
    }
}

// ============================================================================
// Translation Metrics
// ============================================================================

pub mod translation {
    use super::MetricName;

    pub fn header_translated() {
        ::metrics::counter!(MetricName::TranslationHeadersTranslated.as_str()).increment(1);
    }

    pub fn header_overridden() {
        ::metrics::counter!(MetricName::TranslationHeadersOverridden.as_str()).increment(1);
    }

    pub fn fallback() {
        ::metrics::counter!(MetricName::TranslationFallbacks.as_str()).increment(1);
    }

    pub fn retry() {
        ::metrics::counter!(MetricName::TranslationRetries.as_str()).increment(1);
    }

    pub fn request_duration(secs: f64) {
        ::metrics::histogram!(MetricName::TranslationRequestDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Cleaning Stage Metrics
// ============================================================================

pub mod cleaning {
    use super::MetricName;

    pub fn rows_merged(rows: usize) {
        ::metrics::counter!(MetricName::AddressRowsMerged.as_str()).increment(rows as u64);
    }

    pub fn email_rejected(rows: usize) {
        ::metrics::counter!(MetricName::EmailRowsRejected.as_str()).increment(rows as u64);
    }

    pub fn duplicates_rejected(rows: usize) {
        ::metrics::counter!(MetricName::DedupeRowsRejected.as_str()).increment(rows as u64);
    }
}

// ============================================================================
// Writer Metrics
// ============================================================================

pub mod writer {
    use super::MetricName;

    pub fn rows_written(target: &'static str, rows: usize) {
        ::metrics::counter!(MetricName::WriterRowsWritten.as_str(), "output" => target)
            .increment(rows as u64);
    }

    pub fn failure(target: &'static str) {
        ::metrics::counter!(MetricName::WriterFailures.as_str(), "output" => target).increment(1);
    }
}
