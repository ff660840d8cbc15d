pub mod config;
pub mod constants;
pub mod error;
pub mod observability;
pub mod pipeline;

// Application layer (use cases and ports) and its adapters
pub mod app;
pub mod infra;

// Data shapes shared across layers
pub mod domain;
