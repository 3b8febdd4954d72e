//! Input/output helpers.
//!
//! - data ingest from CSV or plain text (`ingest`)
//! - data CSV and fit-result JSON exports (`export`)
//! - JSON model files (`model_file`)

pub mod export;
pub mod ingest;
pub mod model_file;

pub use export::*;
pub use ingest::*;
pub use model_file::*;
