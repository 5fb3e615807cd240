pub mod config;
pub mod error;
pub mod logging;

// Domain data shapes shared across layers
pub mod domain;

// Application boundaries and pipeline stages
pub mod app;
pub mod pipeline;

// Adapters behind the application ports
pub mod infra;
