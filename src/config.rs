use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants;
use crate::error::{CleanerError, Result};

/// Top-level configuration, read from `cleaner.toml` when present.
/// Every section has defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub schema: SchemaMapping,
    pub loader: LoaderConfig,
    pub translation: TranslationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input: PathBuf,
    pub clean: PathBuf,
    pub garbage: PathBuf,
    /// Destination for rejected rows when `output.garbage_mode = "split"`
    pub rejected: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(constants::DEFAULT_INPUT_PATH),
            clean: PathBuf::from(constants::DEFAULT_CLEAN_PATH),
            garbage: PathBuf::from(constants::DEFAULT_GARBAGE_PATH),
            rejected: None,
        }
    }
}

impl PathsConfig {
    /// Rejected-row path for split mode: explicit, or `<garbage stem>_rejected.csv`
    pub fn rejected_path(&self) -> PathBuf {
        if let Some(p) = &self.rejected {
            return p.clone();
        }
        let stem = self
            .garbage
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "garbage".to_string());
        self.garbage.with_file_name(format!("{stem}_rejected.csv"))
    }
}

/// What to do when a column a stage depends on is absent after translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingColumnPolicy {
    /// Stop the run with a schema error
    #[default]
    Fail,
    /// Treat the absent column as all-empty
    Empty,
}

/// Labels the cleaning stages look for, so differing exports can be mapped
/// without code changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaMapping {
    pub province: String,
    pub city: String,
    pub address: String,
    pub post_code: String,
    pub email: String,
    pub full_address: String,
    pub dedupe_key: Vec<String>,
    pub garbage_columns: Vec<String>,
    pub on_missing_column: MissingColumnPolicy,
}

impl Default for SchemaMapping {
    fn default() -> Self {
        Self {
            province: constants::PROVINCE.to_string(),
            city: constants::CITY.to_string(),
            address: constants::ADDRESS.to_string(),
            post_code: constants::POST_CODE.to_string(),
            email: constants::EMAIL.to_string(),
            full_address: constants::FULL_ADDRESS.to_string(),
            dedupe_key: constants::default_dedupe_key(),
            garbage_columns: constants::default_garbage_columns(),
            on_missing_column: MissingColumnPolicy::Fail,
        }
    }
}

impl SchemaMapping {
    /// Address source labels in join order
    pub fn address_columns(&self) -> [&str; 4] {
        [
            self.province.as_str(),
            self.city.as_str(),
            self.address.as_str(),
            self.post_code.as_str(),
        ]
    }

    /// Every column moved into the garbage set by the address merge:
    /// the address sources first, then the side columns
    pub fn dropped_columns(&self) -> Vec<String> {
        self.address_columns()
            .iter()
            .map(|c| c.to_string())
            .chain(self.garbage_columns.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub delimiter: char,
    pub trim: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { delimiter: ',', trim: false }
    }
}

/// Behaviour when a single header cannot be translated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationFailurePolicy {
    /// Keep the original label and carry on
    #[default]
    KeepOriginal,
    /// Abort the run
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub enabled: bool,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub source_language: String,
    pub target_language: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub on_failure: TranslationFailurePolicy,
    /// Pass ASCII labels through without a service call
    pub skip_ascii: bool,
    /// Fixed label translations applied before any service call
    pub overrides: HashMap<String, String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: constants::DEFAULT_TRANSLATE_ENDPOINT.to_string(),
            api_key: None,
            source_language: "auto".to_string(),
            target_language: "en".to_string(),
            timeout_seconds: 10,
            max_retries: 2,
            retry_delay_ms: 500,
            on_failure: TranslationFailurePolicy::KeepOriginal,
            skip_ascii: true,
            overrides: HashMap::new(),
        }
    }
}

/// How the two garbage populations are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GarbageMode {
    /// One file, tagged with a `reason` column
    #[default]
    Combined,
    /// Dropped columns in the garbage file, rejected rows in a second file
    Split,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub garbage_mode: GarbageMode,
    pub delimiter: char,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            garbage_mode: GarbageMode::Combined,
            delimiter: ',',
        }
    }
}

impl Config {
    /// Load configuration. An explicit path must exist; without one the
    /// default `cleaner.toml` is used if present, else built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(constants::DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No {} found, using defaults", constants::DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CleanerError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Environment overrides for the translation service
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CLEANER_TRANSLATE_URL") {
            if !url.trim().is_empty() {
                self.translation.endpoint = url;
            }
        }
        if let Ok(key) = std::env::var("CLEANER_TRANSLATE_API_KEY") {
            if !key.trim().is_empty() {
                self.translation.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        single_byte(self.loader.delimiter, "loader.delimiter")?;
        single_byte(self.output.delimiter, "output.delimiter")?;
        if self.schema.dedupe_key.is_empty() {
            return Err(CleanerError::Config("schema.dedupe_key must name at least one column".into()));
        }
        if self.paths.clean == self.paths.garbage {
            return Err(CleanerError::Config(
                "paths.clean and paths.garbage must differ".into(),
            ));
        }
        if self.output.garbage_mode == GarbageMode::Split {
            let rejected = self.paths.rejected_path();
            if rejected == self.paths.clean || rejected == self.paths.garbage {
                return Err(CleanerError::Config(format!(
                    "rejected output '{}' must differ from paths.clean and paths.garbage",
                    rejected.display()
                )));
            }
        }
        Ok(())
    }
}

/// Convert a configured delimiter into the single byte the csv crate expects
pub fn single_byte(c: char, field: &str) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(CleanerError::Config(format!("{field} must be a single ASCII character, got '{c}'")))
    }
}
