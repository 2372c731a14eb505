// src/lib.rs

#[macro_use]
pub mod macros;
#[macro_use]
pub mod log;

pub mod config;
pub mod core;
pub mod error;

pub mod record;
pub mod store;
pub mod scrape;
pub mod fallback;
pub mod progress;
pub mod orchestrator;
pub mod schema;
pub mod pipeline;
pub mod report;

#[cfg(feature = "cli")]
pub mod cli;
