use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::app::ports::{TableOutputPort, TranslatorPort, WrittenOutput};
use crate::config::{Config, SchemaMapping};
use crate::domain::{GarbageReason, GarbageSet, Table};
use crate::error::Result;
use crate::infra::{CsvOutputAdapter, HttpTranslator};
use crate::observability::metrics;
use crate::pipeline::ingestion::{load_table, LoaderOptions};
use crate::pipeline::processing::address::merge_addresses;
use crate::pipeline::processing::dedupe::remove_duplicates;
use crate::pipeline::processing::email::filter_invalid_emails;
use crate::pipeline::processing::headers::{apply_translations, translate_headers, HeaderStatus, HeaderTranslation};

/// Working table and garbage after the cleaning stages
#[derive(Debug)]
pub struct CleanedTables {
    pub clean: Table,
    pub garbage: GarbageSet,
    pub dropped_columns: Vec<String>,
    pub absent_columns: Vec<String>,
}

/// Summary of a complete cleaning run
#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub input_path: PathBuf,
    pub input_rows: usize,
    pub clean_rows: usize,
    pub invalid_email_rows: usize,
    pub duplicate_rows: usize,
    pub dropped_columns: Vec<String>,
    pub absent_columns: Vec<String>,
    pub headers: Vec<HeaderTranslation>,
    pub translation_failures: usize,
    pub outputs: Vec<WrittenOutput>,
}

impl CleanReport {
    pub fn rejected_rows(&self) -> usize {
        self.invalid_email_rows + self.duplicate_rows
    }

    /// Persist the report as pretty JSON
    pub fn persist_to_json(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json_content = serde_json::to_string_pretty(self)?;
        fs::write(path, json_content)?;
        Ok(())
    }
}

/// Run the row-level stages in order: address merge, email check, dedupe.
/// The loaded and translated table is consumed.
pub fn clean_table(mut table: Table, schema: &SchemaMapping) -> Result<CleanedTables> {
    let mut garbage = GarbageSet::new();

    let t_stage = Instant::now();
    let merge = merge_addresses(&mut table, &mut garbage, schema)?;
    metrics::stage_duration("address", t_stage.elapsed().as_secs_f64());

    let t_stage = Instant::now();
    filter_invalid_emails(&mut table, &mut garbage, schema)?;
    metrics::stage_duration("email", t_stage.elapsed().as_secs_f64());

    let t_stage = Instant::now();
    remove_duplicates(&mut table, &mut garbage, schema)?;
    metrics::stage_duration("dedupe", t_stage.elapsed().as_secs_f64());

    Ok(CleanedTables {
        clean: table,
        garbage,
        dropped_columns: merge.dropped_columns,
        absent_columns: merge.absent_columns,
    })
}

/// Use case driving a whole run from input file to output files
pub struct CleanUseCase {
    config: Config,
    translator: Option<Box<dyn TranslatorPort>>,
    output: Box<dyn TableOutputPort>,
}

impl CleanUseCase {
    pub fn new(
        config: Config,
        translator: Option<Box<dyn TranslatorPort>>,
        output: Box<dyn TableOutputPort>,
    ) -> Self {
        Self {
            config,
            translator,
            output,
        }
    }

    /// Validate config, then wire the HTTP translator (when enabled) and the
    /// CSV writer from it
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let translator: Option<Box<dyn TranslatorPort>> = if config.translation.enabled {
            Some(Box::new(HttpTranslator::from_config(&config.translation)?))
        } else {
            None
        };
        let output = Box::new(CsvOutputAdapter::from_config(&config)?);
        Ok(Self::new(config, translator, output))
    }

    /// Load the input and translate its headers
    #[instrument(skip(self), fields(input = %self.config.paths.input.display()))]
    pub async fn load_and_translate(&self) -> Result<(Table, Vec<HeaderTranslation>)> {
        let t_stage = Instant::now();
        let options = LoaderOptions::try_from(&self.config.loader)?;
        let mut table = load_table(&self.config.paths.input, options)?;
        metrics::stage_duration("load", t_stage.elapsed().as_secs_f64());

        let t_stage = Instant::now();
        let headers = translate_headers(table.columns(), self.translator.as_deref(), &self.config.translation).await?;
        apply_translations(&mut table, &headers)?;
        metrics::stage_duration("translate", t_stage.elapsed().as_secs_f64());

        Ok((table, headers))
    }

    /// Run every stage and write both outputs
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<CleanReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, "🚀 Starting cleaning run");

        // Step 1 and 2: load and translate headers
        let (table, headers) = self.load_and_translate().await?;
        let input_rows = table.len();
        let translation_failures = headers
            .iter()
            .filter(|h| h.status == HeaderStatus::Fallback)
            .count();

        // Steps 3 to 5: address merge, email check, dedupe
        let cleaned = clean_table(table, &self.config.schema)?;
        let invalid_email_rows = cleaned.garbage.count(GarbageReason::InvalidEmail);
        let duplicate_rows = cleaned.garbage.count(GarbageReason::Duplicate);

        if cleaned.clean.len() + invalid_email_rows + duplicate_rows != input_rows {
            warn!(
                "Row accounting mismatch: {} clean + {} invalid + {} duplicate != {} input",
                cleaned.clean.len(),
                invalid_email_rows,
                duplicate_rows,
                input_rows
            );
        }

        // Step 6: write both outputs
        let t_stage = Instant::now();
        let outputs = self.output.write_outputs(&cleaned.clean, &cleaned.garbage)?;
        metrics::stage_duration("write", t_stage.elapsed().as_secs_f64());
        metrics::run_completed();

        info!(
            "✅ Run finished: {} clean, {} invalid email, {} duplicate of {} rows",
            cleaned.clean.len(),
            invalid_email_rows,
            duplicate_rows,
            input_rows
        );

        Ok(CleanReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            input_path: self.config.paths.input.clone(),
            input_rows,
            clean_rows: cleaned.clean.len(),
            invalid_email_rows,
            duplicate_rows,
            dropped_columns: cleaned.dropped_columns,
            absent_columns: cleaned.absent_columns,
            headers,
            translation_failures,
            outputs,
        })
    }
}
