//! Exports: generated data as CSV, fit results as JSON.
//!
//! Stored results can be applied to a freshly built model again, so plots and
//! reports can be produced without refitting.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::info;

use crate::error::{FitError, Result};
use crate::fit::FitResult;
use crate::models::Pdf;

/// Write `values` as a single-column CSV with header `column`.
pub fn write_data_csv(path: &Path, column: &str, values: &[f64]) -> Result<()> {
    let file = File::create(path).map_err(|e| FitError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    writer.write_record([column])?;
    for v in values {
        writer.write_record([format!("{v}")])?;
    }
    writer.flush().map_err(|e| FitError::io(path, e))?;
    info!("Wrote {} values to {}", values.len(), path.display());
    Ok(())
}

/// Write a fit result as pretty-printed JSON.
pub fn write_result_json(path: &Path, result: &FitResult) -> Result<()> {
    let file = File::create(path).map_err(|e| FitError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)?;
    info!("Wrote fit result to {}", path.display());
    Ok(())
}

/// Read a fit result JSON file.
pub fn read_result_json(path: &Path) -> Result<FitResult> {
    let file = File::open(path).map_err(|e| FitError::io(path, e))?;
    let result: FitResult = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(result)
}

/// Copy stored values and errors into the model's parameters.
///
/// Every stored parameter must exist in the model; model parameters missing
/// from the result keep their values.
pub fn apply_result<P: Pdf + ?Sized>(pdf: &mut P, result: &FitResult) -> Result<()> {
    let mut params = pdf.parameters_mut();
    for estimate in &result.parameters {
        let param = params
            .iter_mut()
            .find(|p| p.name == estimate.name)
            .ok_or_else(|| FitError::UnknownParameter(estimate.name.clone()))?;
        param.value = estimate.value;
        param.error = estimate.error;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{ParamEstimate, Strategy};
    use crate::io::ingest::read_data;
    use crate::models::Gauss;
    use chrono::Utc;

    fn result(params: Vec<ParamEstimate>) -> FitResult {
        FitResult {
            model: "gauss".to_string(),
            valid: true,
            status: "Solver converged".to_string(),
            strategy: Strategy::Lbfgs,
            iterations: 7,
            fn_evals: 42,
            nll: 10.5,
            n_events: 100,
            n_dropped: 0,
            parameters: params,
            covariance: None,
            covariance_names: Vec::new(),
            fitted_at: Utc::now(),
        }
    }

    fn estimate(name: &str, value: f64) -> ParamEstimate {
        ParamEstimate {
            name: name.to_string(),
            value,
            error: Some(0.1),
            lwb: None,
            upb: None,
            is_constant: false,
        }
    }

    #[test]
    fn data_csv_is_readable_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        write_data_csv(&path, "mass", &[1.5, -0.25, 3.0]).unwrap();
        let back = read_data(&path, None, "mass").unwrap();
        assert_eq!(back.values, vec![1.5, -0.25, 3.0]);
    }

    #[test]
    fn result_json_survives_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        let r = result(vec![estimate("gauss_mean", 0.3)]);
        write_result_json(&path, &r).unwrap();
        assert_eq!(read_result_json(&path).unwrap(), r);
    }

    #[test]
    fn apply_result_updates_known_parameters() {
        let mut g = Gauss::with_defaults(("x", -3.0, 3.0)).unwrap();
        apply_result(&mut g, &result(vec![estimate("gauss_mean", 0.3)])).unwrap();
        assert_eq!(g.mean().value, 0.3);
        assert_eq!(g.mean().error, Some(0.1));
        assert_eq!(g.sigma().value, 0.5);

        let err = apply_result(&mut g, &result(vec![estimate("other", 1.0)])).unwrap_err();
        assert!(matches!(err, FitError::UnknownParameter(name) if name == "other"));
    }
}
