use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanerError {
    #[error("Failed to load data from '{path}': {reason}")]
    DataLoad { path: String, reason: String },

    #[error("{stage}: missing expected column(s): {}", missing.join(", "))]
    Schema { stage: &'static str, missing: Vec<String> },

    #[error("Failed to translate header '{label}': {reason}")]
    Translation { label: String, reason: String },

    #[error("Failed to write {target} output '{path}': {reason}")]
    Write {
        target: &'static str,
        path: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CleanerError>;
