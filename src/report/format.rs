//! Formatted terminal output for models and fit results.
//!
//! Formatting stays in one place so the fitting code stays clean and output
//! changes are localized.

use crate::domain::RealVar;
use crate::fit::{FitResult, ParamEstimate};
use crate::models::Pdf;

/// Format `v` with `digits` significant digits, like C's `%g` but with
/// Rust's exponent notation (`1.23e5`).
pub fn fmt_sig(v: f64, digits: usize) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    if v == 0.0 {
        return "0".to_string();
    }
    let digits = digits.max(1);
    // The exponent is taken after rounding, so 999.6 at 3 digits is 1e3.
    let sci = format!("{:.*e}", digits - 1, v);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= digits as i32 {
        return format!("{}e{exp}", strip_zeros(mantissa));
    }
    let decimals = (digits as i32 - 1 - exp).max(0) as usize;
    strip_zeros(&format!("{v:.decimals$}")).to_string()
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// One row of a parameter table.
struct Row<'a> {
    name: &'a str,
    value: f64,
    error: Option<f64>,
    lwb: Option<f64>,
    upb: Option<f64>,
    unit: &'a str,
    is_constant: bool,
}

impl<'a> From<&'a RealVar> for Row<'a> {
    fn from(v: &'a RealVar) -> Self {
        Self {
            name: &v.name,
            value: v.value,
            error: v.error,
            lwb: v.lwb,
            upb: v.upb,
            unit: &v.unit,
            is_constant: v.is_constant,
        }
    }
}

impl<'a> From<&'a ParamEstimate> for Row<'a> {
    fn from(p: &'a ParamEstimate) -> Self {
        Self {
            name: &p.name,
            value: p.value,
            error: p.error,
            lwb: p.lwb,
            upb: p.upb,
            unit: "",
            is_constant: p.is_constant,
        }
    }
}

fn fmt_limit(v: Option<f64>, missing: &str) -> String {
    v.map_or_else(|| missing.to_string(), |x| fmt_sig(x, 4))
}

fn format_table(rows: &[Row<'_>]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<24} {:>12} {:>12} {:<24} {:<8}",
            "name", "value", "error", "limits", "unit"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<12} {:-<12} {:-<24} {:-<8}", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        let error = match (r.is_constant, r.error) {
            (true, _) => "const".to_string(),
            (false, Some(e)) => format!("± {}", fmt_sig(e, 3)),
            (false, None) => String::new(),
        };
        let limits = format!("[{}, {}]", fmt_limit(r.lwb, "-inf"), fmt_limit(r.upb, "+inf"));
        out.push_str(
            format!(
                "{:<24} {:>12} {:>12} {:<24} {:<8}",
                truncate(r.name, 24),
                fmt_sig(r.value, 6),
                error,
                limits,
                truncate(r.unit, 8),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Parameter table of a model, with its current values and errors.
pub fn format_parameters<P: Pdf + ?Sized>(pdf: &P) -> String {
    let mut out = String::new();
    let obs = pdf.observable();
    out.push_str(&format!("{} ({})\n", pdf.name(), pdf.title()));
    out.push_str(&format!(
        "observable: {} in [{}, {}]",
        obs.label(),
        fmt_limit(obs.lwb, "-inf"),
        fmt_limit(obs.upb, "+inf"),
    ));
    if !obs.unit.is_empty() {
        out.push_str(&format!(" {}", obs.unit));
    }
    out.push_str("\n\n");
    let rows: Vec<Row<'_>> = pdf.parameters().into_iter().map(Row::from).collect();
    out.push_str(&format_table(&rows));
    out
}

/// Fit status, parameters and correlations of a stored result.
pub fn format_fit_summary(result: &FitResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== minufit - {} ===\n", result.model));
    out.push_str(&format!(
        "Status: {} ({})\n",
        if result.valid { "valid" } else { "INVALID" },
        result.status
    ));
    out.push_str(&format!(
        "Strategy: {} | iterations={} | evaluations={}\n",
        result.strategy.display_name(),
        result.iterations,
        result.fn_evals
    ));
    out.push_str(&format!("NLL: {:.6}\n", result.nll));
    out.push_str(&format!("Events: {}", result.n_events));
    if result.n_dropped > 0 {
        out.push_str(&format!(" ({} dropped outside range)", result.n_dropped));
    }
    out.push('\n');
    out.push_str(&format!("Fitted at: {}\n\n", result.fitted_at.format("%Y-%m-%d %H:%M:%S UTC")));

    let rows: Vec<Row<'_>> = result.parameters.iter().map(Row::from).collect();
    out.push_str(&format_table(&rows));

    if let Some(corr) = format_correlation(result) {
        out.push_str("\nCorrelations:\n");
        out.push_str(&corr);
    }
    out
}

/// Correlation matrix of the free parameters, or `None` without a covariance.
pub fn format_correlation(result: &FitResult) -> Option<String> {
    let corr = result.correlation_matrix()?;
    let names = &result.covariance_names;
    if names.len() != corr.nrows() {
        return None;
    }
    let mut out = String::new();
    out.push_str(&format!("{:<16}", ""));
    for name in names {
        out.push_str(&format!(" {:>10}", truncate(name, 10)));
    }
    out.push('\n');
    for (i, name) in names.iter().enumerate() {
        out.push_str(&format!("{:<16}", truncate(name, 16)));
        for j in 0..names.len() {
            out.push_str(&format!(" {:>10.3}", corr[(i, j)]));
        }
        out.push('\n');
    }
    Some(out)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
