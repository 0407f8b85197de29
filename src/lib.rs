//! formreview - evaluation-form templates from Excel spreadsheets
//!
//! This library finds the header row of an uploaded evaluation form, resolves
//! merged header cells, decides which cells an employee fills in, and stores
//! the resulting table per branch/department/position.
//!
//! # Features
//!
//! - Strict (`STT` + `Chỉ tiêu` in the first two columns) and flexible header detection
//! - Diacritic- and case-insensitive column matching
//! - Italic-label or fill-color input-cell policies, chosen per deployment
//! - Sentinel `D` row terminates the data region
//! - Memory or SQLite template store behind one trait, served over HTTP
//!
//! # Example
//!
//! ```no_run
//! use formreview::ingest::TemplateParser;
//!
//! let table = TemplateParser::default().parse_path("form.xlsx")?;
//!
//! println!("Mode: {}", table.meta.mode);
//! println!("Columns: {}", table.headers.len());
//! println!("Input cells: {}", table.input_cell_count());
//! # Ok::<(), formreview::error::FormError>(())
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod org;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{FormError, FormResult};
pub use types::{CellValue, ParseMode, ParsedTable, TableCell, Template, TemplateKey};
