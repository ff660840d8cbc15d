use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::domain::{GarbageSet, Table};

/// External translation capability used for header labels.
/// Given a text and language pair, returns the translated text or fails.
#[async_trait]
pub trait TranslatorPort: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, String>;
}

/// One persisted output
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WrittenOutput {
    pub target: &'static str,
    pub path: PathBuf,
    pub rows: usize,
}

/// Destination for the final clean table and garbage set.
/// Implementations write every output or none of them.
pub trait TableOutputPort: Send + Sync {
    fn write_outputs(&self, clean: &Table, garbage: &GarbageSet) -> crate::error::Result<Vec<WrittenOutput>>;
}
