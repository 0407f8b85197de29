//! formreview API server module
//!
//! HTTP REST API over the template service.
//! Run with `formreview serve` or `formreview-server`.

pub mod error;
pub mod handlers;
pub mod server;

pub use server::{build_router, run_api_server, AppState};
