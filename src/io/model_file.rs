//! Model files: JSON model definitions (see [`ModelSpec`]).

use std::path::Path;

use log::debug;

use crate::error::{FitError, Result};
use crate::models::{ModelSpec, Pdf};

/// Parse a model file without building the model.
pub fn read_model_spec(path: &Path) -> Result<ModelSpec> {
    let text = std::fs::read_to_string(path).map_err(|e| FitError::io(path, e))?;
    ModelSpec::from_json(&text).map_err(|e| match e {
        FitError::Json(err) => FitError::InvalidModel(format!("{}: {err}", path.display())),
        other => other,
    })
}

/// Read and build the model defined in `path`.
pub fn load_model(path: &Path) -> Result<Box<dyn Pdf>> {
    let pdf = read_model_spec(path)?.build()?;
    debug!(
        "Loaded model '{}' from {} with {} parameters",
        pdf.name(),
        path.display(),
        pdf.n_params()
    );
    Ok(pdf)
}
