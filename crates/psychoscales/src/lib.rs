//! Psychological self-assessment scales: definitions, validation, scoring, catalog and export.

pub mod config;
pub mod error;
pub mod scales;
pub mod telemetry;
