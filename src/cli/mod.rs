//! CLI command handlers

pub mod commands;

pub use commands::{import, list, parse, remove, sample, sample_workbook, serve, show};
