// Cleaning pipeline: ingestion and processing stages

pub mod ingestion;
pub mod processing;
