use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::TranslatorPort;
use crate::config::{TranslationConfig, TranslationFailurePolicy};
use crate::constants::UNNAMED_PREFIX;
use crate::domain::Table;
use crate::error::{CleanerError, Result};
use crate::observability::metrics;

/// How a header label was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderStatus {
    /// Taken from the configured override dictionary
    Override,
    /// Left as is without calling the service
    Unchanged,
    /// Returned by the translation service
    Translated,
    /// The service failed; the original label was kept
    Fallback,
}

impl HeaderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderStatus::Override => "override",
            HeaderStatus::Unchanged => "unchanged",
            HeaderStatus::Translated => "translated",
            HeaderStatus::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderTranslation {
    pub original: String,
    pub translated: String,
    pub status: HeaderStatus,
}

impl HeaderTranslation {
    fn new(original: &str, translated: String, status: HeaderStatus) -> Self {
        Self {
            original: original.to_string(),
            translated,
            status,
        }
    }
}

/// Translate every label, one service call per label, keeping position.
///
/// With no translator (translation disabled) only overrides are applied.
#[instrument(skip_all, fields(columns = labels.len()))]
pub async fn translate_headers(
    labels: &[String],
    translator: Option<&dyn TranslatorPort>,
    config: &TranslationConfig,
) -> Result<Vec<HeaderTranslation>> {
    let mut out = Vec::with_capacity(labels.len());

    for label in labels {
        if let Some(fixed) = config.overrides.get(label) {
            metrics::translation::header_overridden();
            out.push(HeaderTranslation::new(label, fixed.clone(), HeaderStatus::Override));
            continue;
        }

        let passthrough = label.starts_with(UNNAMED_PREFIX) || (config.skip_ascii && label.is_ascii());
        let translator = match translator {
            Some(t) if !passthrough => t,
            _ => {
                out.push(HeaderTranslation::new(label, label.clone(), HeaderStatus::Unchanged));
                continue;
            }
        };

        let started = Instant::now();
        let result = translator
            .translate(label, &config.source_language, &config.target_language)
            .await
            .and_then(|t| {
                let t = t.trim().to_string();
                if t.is_empty() {
                    Err("empty translation".to_string())
                } else {
                    Ok(t)
                }
            });
        metrics::translation::request_duration(started.elapsed().as_secs_f64());

        match result {
            Ok(translated) => {
                debug!("Translated '{}' -> '{}'", label, translated);
                metrics::translation::header_translated();
                out.push(HeaderTranslation::new(label, translated, HeaderStatus::Translated));
            }
            Err(reason) => match config.on_failure {
                TranslationFailurePolicy::KeepOriginal => {
                    warn!("Keeping header '{}' untranslated: {}", label, reason);
                    metrics::translation::fallback();
                    out.push(HeaderTranslation::new(label, label.clone(), HeaderStatus::Fallback));
                }
                TranslationFailurePolicy::Abort => {
                    return Err(CleanerError::Translation {
                        label: label.clone(),
                        reason,
                    });
                }
            },
        }
    }

    let fallbacks = out.iter().filter(|h| h.status == HeaderStatus::Fallback).count();
    info!("Resolved {} headers ({} kept after failed translation)", out.len(), fallbacks);
    Ok(out)
}

/// Rename the table's columns to the translated labels
pub fn apply_translations(table: &mut Table, translations: &[HeaderTranslation]) -> Result<()> {
    let labels: Vec<String> = translations.iter().map(|t| t.translated.clone()).collect();

    let mut seen = HashSet::new();
    for label in &labels {
        if !seen.insert(label.as_str()) {
            warn!("Header '{}' appears more than once after translation; lookups use the first", label);
        }
    }

    table.rename_columns(labels).map_err(CleanerError::Config)
}
