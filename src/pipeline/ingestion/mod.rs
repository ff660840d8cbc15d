// Pipeline ingestion: reading the input table

pub mod loader;

pub use loader::{load_table, LoaderOptions};
