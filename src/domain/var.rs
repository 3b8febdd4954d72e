//! Real-valued variables (observables and parameters) and their compact
//! tuple specifications.
//!
//! A variable can be specified the same way for observables and parameters:
//!
//! - `(lo, hi)`: range, initial value at the midpoint
//! - `(lo, value, hi)`: range with an initial value
//! - `("name", lo, hi)` / `("name", lo, value, hi)`: the same with a name
//! - a single number: free, unbounded variable starting at that value
//!
//! The numbers are sorted before they are interpreted, so
//! `(0.1, 1.0, 2.0)` and `(2.0, 0.1, 1.0)` describe the same variable.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};
use crate::report::fmt_sig;

/// Name given to variables specified without one.
pub const DEFAULT_VAR_NAME: &str = "x";

/// A named real variable with optional limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealVar {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub error: Option<f64>,
    #[serde(default)]
    pub lwb: Option<f64>,
    #[serde(default)]
    pub upb: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_constant: bool,
}

impl RealVar {
    /// Free, unbounded variable.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            error: None,
            lwb: None,
            upb: None,
            unit: String::new(),
            title: String::new(),
            is_constant: false,
        }
    }

    /// Constant (fixed) variable.
    pub fn constant(name: impl Into<String>, value: f64) -> Self {
        Self {
            is_constant: true,
            ..Self::new(name, value)
        }
    }

    pub fn with_limits(mut self, lwb: f64, upb: f64) -> Self {
        let (lo, hi) = if lwb <= upb { (lwb, upb) } else { (upb, lwb) };
        self.lwb = Some(lo);
        self.upb = Some(hi);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Title if set, otherwise the name.
    pub fn label(&self) -> &str {
        if self.title.is_empty() { &self.name } else { &self.title }
    }

    pub fn with_error(mut self, error: f64) -> Self {
        self.error = Some(error);
        self
    }

    pub fn set_constant(&mut self, constant: bool) {
        self.is_constant = constant;
    }

    /// Finite `(lwb, upb)` with `lwb < upb`, if both limits are set.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match (self.lwb, self.upb) {
            (Some(lo), Some(hi)) if lo.is_finite() && hi.is_finite() && lo < hi => Some((lo, hi)),
            _ => None,
        }
    }

    /// Whether `x` lies inside the limits (missing limits are open).
    pub fn contains(&self, x: f64) -> bool {
        self.lwb.is_none_or(|lo| x >= lo) && self.upb.is_none_or(|hi| x <= hi)
    }

    /// Clamp `x` into the limits.
    pub fn clamp(&self, x: f64) -> f64 {
        let mut out = x;
        if let Some(lo) = self.lwb {
            out = out.max(lo);
        }
        if let Some(hi) = self.upb {
            out = out.min(hi);
        }
        out
    }
}

impl From<&RealVar> for f64 {
    fn from(var: &RealVar) -> Self {
        var.value
    }
}

impl From<RealVar> for f64 {
    fn from(var: RealVar) -> Self {
        var.value
    }
}

impl fmt::Display for RealVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, fmt_sig(self.value, 3))?;
        if let Some(err) = self.error.filter(|e| *e != 0.0) {
            write!(f, " ± {}", fmt_sig(err, 3))?;
        }
        if !self.unit.is_empty() {
            write!(f, " {}", self.unit)?;
        }
        Ok(())
    }
}

/// Compact specification of a variable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "VarSpecRepr")]
pub enum VarSpec {
    /// Already-built variable, used as is.
    Var(RealVar),
    /// Optional name followed by two or three numbers.
    List { name: Option<String>, numbers: Vec<f64> },
    /// Single starting value, no limits.
    Value(f64),
}

impl VarSpec {
    /// Name carried by the specification, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            VarSpec::Var(var) => Some(var.name.as_str()),
            VarSpec::List { name, .. } => name.as_deref(),
            VarSpec::Value(_) => None,
        }
    }
}

impl From<RealVar> for VarSpec {
    fn from(var: RealVar) -> Self {
        VarSpec::Var(var)
    }
}

impl From<&RealVar> for VarSpec {
    fn from(var: &RealVar) -> Self {
        VarSpec::Var(var.clone())
    }
}

impl From<f64> for VarSpec {
    fn from(value: f64) -> Self {
        VarSpec::Value(value)
    }
}

impl From<(f64, f64)> for VarSpec {
    fn from((a, b): (f64, f64)) -> Self {
        VarSpec::List {
            name: None,
            numbers: vec![a, b],
        }
    }
}

impl From<(f64, f64, f64)> for VarSpec {
    fn from((a, b, c): (f64, f64, f64)) -> Self {
        VarSpec::List {
            name: None,
            numbers: vec![a, b, c],
        }
    }
}

impl From<(&str, f64, f64)> for VarSpec {
    fn from((name, a, b): (&str, f64, f64)) -> Self {
        VarSpec::List {
            name: Some(name.to_string()),
            numbers: vec![a, b],
        }
    }
}

impl From<(&str, f64, f64, f64)> for VarSpec {
    fn from((name, a, b, c): (&str, f64, f64, f64)) -> Self {
        VarSpec::List {
            name: Some(name.to_string()),
            numbers: vec![a, b, c],
        }
    }
}

impl From<&[f64]> for VarSpec {
    fn from(numbers: &[f64]) -> Self {
        VarSpec::List {
            name: None,
            numbers: numbers.to_vec(),
        }
    }
}

/// JSON shape of a [`VarSpec`]: a number or a list like `["mass", 745, 755]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VarSpecRepr {
    Value(f64),
    List(Vec<ListItem>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListItem {
    Name(String),
    Number(f64),
}

impl TryFrom<VarSpecRepr> for VarSpec {
    type Error = FitError;

    fn try_from(repr: VarSpecRepr) -> Result<Self> {
        match repr {
            VarSpecRepr::Value(v) => Ok(VarSpec::Value(v)),
            VarSpecRepr::List(items) => {
                let mut name = None;
                let mut numbers = Vec::with_capacity(items.len());
                for (idx, item) in items.into_iter().enumerate() {
                    match item {
                        ListItem::Name(n) if idx == 0 => name = Some(n),
                        ListItem::Name(n) => {
                            return Err(FitError::InvalidVarSpec(format!(
                                "name '{n}' must be the first entry"
                            )));
                        }
                        ListItem::Number(v) => numbers.push(v),
                    }
                }
                Ok(VarSpec::List { name, numbers })
            }
        }
    }
}

/// Split a list specification into `(value, lwb, upb)`.
fn extract_from_list(numbers: &[f64]) -> Result<(f64, f64, f64)> {
    if numbers.iter().any(|v| !v.is_finite()) {
        return Err(FitError::InvalidVarSpec(format!(
            "all numbers must be finite, got {numbers:?}"
        )));
    }
    let mut sorted = numbers.to_vec();
    sorted.sort_by(f64::total_cmp);
    match sorted.as_slice() {
        [lo, hi] => Ok(((lo + hi) / 2.0, *lo, *hi)),
        [lo, value, hi] => Ok((*value, *lo, *hi)),
        _ => Err(FitError::InvalidVarSpec(format!(
            "expected 2 or 3 numbers like ('x', -1, 1) or (-2, 0, 3), got {}",
            numbers.len()
        ))),
    }
}

/// Build a [`RealVar`] from a specification.
///
/// An explicit variable is returned unchanged. Unnamed specifications get
/// [`DEFAULT_VAR_NAME`].
pub fn create_real_var(spec: impl Into<VarSpec>) -> Result<RealVar> {
    match spec.into() {
        VarSpec::Var(var) => Ok(var),
        VarSpec::Value(value) => {
            if !value.is_finite() {
                return Err(FitError::InvalidVarSpec(format!(
                    "value must be finite, got {value}"
                )));
            }
            Ok(RealVar::new(DEFAULT_VAR_NAME, value))
        }
        VarSpec::List { name, numbers } => {
            let (value, lwb, upb) = extract_from_list(&numbers)?;
            let name = name.unwrap_or_else(|| DEFAULT_VAR_NAME.to_string());
            Ok(RealVar::new(name, value).with_limits(lwb, upb))
        }
    }
}

/// Like [`create_real_var`], with the name forced to `name`.
///
/// Explicit variables keep their own name.
pub fn create_named_var(spec: impl Into<VarSpec>, name: &str) -> Result<RealVar> {
    let spec = spec.into();
    let keep_name = matches!(spec, VarSpec::Var(_));
    let var = create_real_var(spec)?;
    Ok(if keep_name { var } else { var.with_name(name) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_range_puts_value_at_midpoint() {
        let var = create_real_var(("x", -1.0, 1.0)).unwrap();
        assert_eq!(var.name, "x");
        assert_eq!(var.value, 0.0);
        assert_eq!(var.lwb, Some(-1.0));
        assert_eq!(var.upb, Some(1.0));
        assert_eq!(var.unit, "");
    }

    #[test]
    fn unnamed_triple_uses_default_name() {
        let var = create_real_var((-2.0, 0.0, 3.0)).unwrap();
        assert_eq!(var.name, DEFAULT_VAR_NAME);
        assert_eq!(var.value, 0.0);
        assert_eq!(var.bounds(), Some((-2.0, 3.0)));
    }

    #[test]
    fn numbers_are_sorted_before_interpretation() {
        let a = create_real_var((0.1, 1.0, 2.0)).unwrap();
        let b = create_real_var((2.0, 0.1, 1.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.value, 1.0);
        assert_eq!(a.lwb, Some(0.1));
        assert_eq!(a.upb, Some(2.0));
    }

    #[test]
    fn single_value_is_unbounded() {
        let var = create_real_var(5.0).unwrap();
        assert_eq!(var.value, 5.0);
        assert!(var.lwb.is_none() && var.upb.is_none());
        assert!(!var.is_constant);
        assert_eq!(f64::from(&var), 5.0);
    }

    #[test]
    fn explicit_var_is_returned_unchanged() {
        let var = RealVar::new("y", 5.0).with_limits(-10.0, 10.0).with_unit("m");
        let out = create_named_var(var.clone(), "other").unwrap();
        assert_eq!(out, var);
    }

    #[test]
    fn name_override_wins_for_specs() {
        let var = create_named_var(("mass", 745.0, 755.0), "gauss_mean").unwrap();
        assert_eq!(var.name, "gauss_mean");
        assert_eq!(var.value, 750.0);
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let one: &[f64] = &[1.0];
        assert!(matches!(
            create_real_var(one),
            Err(FitError::InvalidVarSpec(_))
        ));
        let four: &[f64] = &[1.0, 2.0, 3.0, 4.0];
        assert!(create_real_var(four).is_err());
        assert!(create_real_var((f64::NAN, 1.0)).is_err());
    }

    #[test]
    fn deserializes_from_json_lists_and_numbers() {
        let spec: VarSpec = serde_json::from_str(r#"["mass", 745, 0.02, 755]"#).unwrap();
        let var = create_real_var(spec).unwrap();
        assert_eq!(var.name, "mass");
        assert_eq!(var.value, 745.0);
        assert_eq!(var.lwb, Some(0.02));
        assert_eq!(var.upb, Some(755.0));

        let spec: VarSpec = serde_json::from_str("1.5").unwrap();
        assert_eq!(spec, VarSpec::Value(1.5));

        let bad: std::result::Result<VarSpec, _> = serde_json::from_str(r#"[1, "late", 2]"#);
        assert!(bad.is_err());
    }

    #[test]
    fn display_uses_three_significant_digits() {
        let var = RealVar::new("mean", 750.01234).with_error(0.01234).with_unit("GeV");
        assert_eq!(var.to_string(), "mean: 750 ± 0.0123 GeV");
        let bare = RealVar::new("sigma", 1.0);
        assert_eq!(bare.to_string(), "sigma: 1");
    }

    #[test]
    fn contains_and_clamp_respect_open_limits() {
        let var = RealVar::new("s", 1.0).with_limits(0.0, 2.0);
        assert!(var.contains(0.0) && var.contains(2.0));
        assert!(!var.contains(2.5));
        assert_eq!(var.clamp(3.0), 2.0);
        let free = RealVar::new("f", 0.0);
        assert!(free.contains(1e12));
        assert_eq!(free.clamp(-7.0), -7.0);
    }
}
