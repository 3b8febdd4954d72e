//! Shared workflow used by both the CLI and the TUI front-ends.
//!
//! model file + data file -> model + events -> fit
//!
//! The front-ends then only deal with presentation (printing vs widgets).

use std::path::Path;

use crate::data::{generate_extended, generate_sample};
use crate::domain::{FitConfig, GenerateConfig};
use crate::error::Result;
use crate::fit::{FitOptions, FitResult, fit};
use crate::io::{Dataset, load_model, read_data, write_data_csv};
use crate::models::Pdf;

/// A model together with the data it is fitted to.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub model: Box<dyn Pdf>,
    pub data: Dataset,
}

/// Outputs of a `fit` run; the model carries the fitted values.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub inputs: Inputs,
    pub result: FitResult,
}

/// Load the model file, then the data column named after its observable.
pub fn load_inputs(model_path: &Path, data_path: &Path, column: Option<&str>) -> Result<Inputs> {
    let model = load_model(model_path)?;
    let data = read_data(data_path, column, &model.observable().name)?;
    Ok(Inputs { model, data })
}

/// Fit already loaded inputs.
pub fn fit_inputs(mut inputs: Inputs, options: &FitOptions) -> Result<RunOutput> {
    let result = fit(inputs.model.as_mut(), &inputs.data.values, options)?;
    Ok(RunOutput { inputs, result })
}

/// Load, then fit.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput> {
    let inputs = load_inputs(&config.model_path, &config.data_path, config.column.as_deref())?;
    fit_inputs(inputs, &config.options)
}

/// Draw a toy dataset from the model file and write it as CSV.
pub fn run_generate(config: &GenerateConfig) -> Result<Vec<f64>> {
    let model = load_model(&config.model_path)?;
    let data = if config.extended {
        generate_extended(model.as_ref(), config.seed)?
    } else {
        generate_sample(model.as_ref(), config.n_events, config.seed)?
    };
    write_data_csv(&config.out, &model.observable().name, &data)?;
    Ok(data)
}
