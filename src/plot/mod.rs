//! Plotting: histograms of the data with the model on top.
//!
//! [`Plotter`] prepares all series (histogram, model curve, component curves,
//! pulls) from a model and a dataset. The renderers only draw:
//!
//! - [`svg`]: SVG files via `plotters`
//! - [`ascii`]: fixed-size character grids for terminals
//! - the TUI chart in [`crate::tui`]

pub mod ascii;
pub mod svg;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::PlotConfig;
use crate::error::{FitError, Result};
use crate::models::Pdf;
use crate::report::fmt_sig;

/// Default component colours, cycled by component index.
pub const DEFAULT_COLORS: [&str; 7] = [
    "#E24A33", "#348ABD", "#988ED5", "#777777", "#FBC15E", "#8EBA42", "#FFB5B8",
];

/// Points per model curve.
pub const CURVE_POINTS: usize = 1000;

/// Pull panel range.
pub const PULL_RANGE: (f64, f64) = (-2.0, 2.0);

/// RGB triple of a `#RRGGBB` colour; black for malformed input.
pub fn hex_rgb(hex: &str) -> (u8, u8, u8) {
    let digits = hex.trim_start_matches('#');
    let channel = |i: usize| {
        digits
            .get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .unwrap_or(0)
    };
    if digits.len() != 6 {
        return (0, 0, 0);
    }
    (channel(0), channel(2), channel(4))
}

/// Colour of the `i`-th component.
pub fn component_color(i: usize) -> (u8, u8, u8) {
    hex_rgb(DEFAULT_COLORS[i % DEFAULT_COLORS.len()])
}

/// Equal-width histogram. Values on the upper edge go into the last bin;
/// values outside the range are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Hist {
    pub counts: Vec<f64>,
    pub edges: Vec<f64>,
    /// Poisson errors `sqrt(n)`.
    pub errors: Vec<f64>,
    pub centers: Vec<f64>,
    pub widths: Vec<f64>,
    pub xlim: (f64, f64),
}

impl Hist {
    pub fn new(data: &[f64], nbins: usize, range: (f64, f64)) -> Result<Self> {
        let (lo, hi) = range;
        if nbins == 0 {
            return Err(FitError::Plot("number of bins must be positive".to_string()));
        }
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(FitError::Plot(format!("invalid plot range [{lo}, {hi}]")));
        }
        let width = (hi - lo) / nbins as f64;
        let edges: Vec<f64> = (0..=nbins).map(|i| lo + i as f64 * width).collect();
        let mut counts = vec![0.0; nbins];
        for &x in data {
            if !(x >= lo && x <= hi) {
                continue;
            }
            let bin = (((x - lo) / width) as usize).min(nbins - 1);
            counts[bin] += 1.0;
        }
        let errors = counts.iter().map(|n: &f64| n.sqrt()).collect();
        let centers = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        let widths = edges.windows(2).map(|w| w[1] - w[0]).collect();
        Ok(Self {
            counts,
            edges,
            errors,
            centers,
            widths,
            xlim: (lo, hi),
        })
    }

    pub fn nbins(&self) -> usize {
        self.counts.len()
    }

    pub fn bin_width(&self) -> f64 {
        self.widths.first().copied().unwrap_or(0.0)
    }
}

/// Drawable element of a plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum PlotPart {
    Hist,
    Pdf,
    Pull,
    Residuals,
    Legend,
    Components,
    AxesLabels,
    Distribution,
}

/// Scaled curve of one component of a composite model.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentCurve {
    pub title: String,
    pub color: (u8, u8, u8),
    pub points: Vec<(f64, f64)>,
}

/// Series preparation for one model and dataset.
pub struct Plotter<'a, P: Pdf + ?Sized> {
    pdf: &'a P,
    data: Vec<f64>,
    hist: Hist,
    scale: f64,
    parts: Vec<PlotPart>,
}

impl<'a, P: Pdf + ?Sized> Plotter<'a, P> {
    /// Bin `data` and pick the default parts for the model.
    ///
    /// Without `nbins` the bin count is `floor(2 N^0.333)`; without `xrange`
    /// the range is the data range.
    pub fn new(pdf: &'a P, data: &[f64], config: &PlotConfig) -> Result<Self> {
        let data: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
        if data.is_empty() {
            return Err(FitError::Plot("no finite data to plot".to_string()));
        }
        let xrange = match config.xrange {
            Some(r) => r,
            None => data_range(&data),
        };
        let nbins = config
            .nbins
            .unwrap_or_else(|| (2.0 * (data.len() as f64).powf(0.333)).floor() as usize)
            .max(1);
        let hist = Hist::new(&data, nbins, xrange)?;
        let scale = data.len() as f64 * hist.bin_width();
        let parts = default_parts(pdf);
        Ok(Self {
            pdf,
            data,
            hist,
            scale,
            parts,
        })
    }

    pub fn with_parts(mut self, parts: Vec<PlotPart>) -> Self {
        self.parts = parts;
        self
    }

    pub fn pdf(&self) -> &P {
        self.pdf
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn hist(&self) -> &Hist {
        &self.hist
    }

    /// Factor turning densities into expected entries per bin.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn parts(&self) -> &[PlotPart] {
        &self.parts
    }

    pub fn has_part(&self, part: PlotPart) -> bool {
        self.parts.contains(&part)
    }

    /// Pulls or residuals get a lower panel.
    pub fn has_lower_panel(&self) -> bool {
        self.has_part(PlotPart::Pull) || self.has_part(PlotPart::Residuals)
    }

    fn grid(&self) -> impl Iterator<Item = f64> + '_ {
        let (lo, hi) = self.hist.xlim;
        let step = (hi - lo) / (CURVE_POINTS - 1) as f64;
        (0..CURVE_POINTS).map(move |i| lo + i as f64 * step)
    }

    /// Model curve in entries per bin.
    pub fn pdf_curve(&self) -> Vec<(f64, f64)> {
        self.grid().map(|x| (x, self.scale * self.pdf.evaluate(x))).collect()
    }

    /// Component curves scaled by their yield fractions.
    pub fn component_curves(&self) -> Vec<ComponentCurve> {
        self.pdf
            .components()
            .into_iter()
            .enumerate()
            .map(|(i, c)| ComponentCurve {
                title: c.title.to_string(),
                color: component_color(i),
                points: self
                    .grid()
                    .map(|x| (x, self.scale * c.fraction * c.pdf.evaluate(x)))
                    .collect(),
            })
            .collect()
    }

    fn expected(&self) -> impl Iterator<Item = f64> + '_ {
        self.hist.centers.iter().map(|c| self.scale * self.pdf.evaluate(*c))
    }

    /// `n - expected` per bin.
    pub fn residuals(&self) -> Vec<f64> {
        self.hist
            .counts
            .iter()
            .zip(self.expected())
            .map(|(n, mu)| n - mu)
            .collect()
    }

    /// `(n - expected) / sqrt(n)` per bin; empty bins give 0.
    pub fn pulls(&self) -> Vec<f64> {
        self.hist
            .counts
            .iter()
            .zip(self.expected())
            .map(|(n, mu)| if *n > 0.0 { (n - mu) / n.sqrt() } else { 0.0 })
            .collect()
    }

    /// Upper end of the main panel's y axis.
    pub fn y_max(&self) -> f64 {
        let hist_max = self
            .hist
            .counts
            .iter()
            .zip(&self.hist.errors)
            .map(|(n, e)| n + e)
            .fold(0.0, f64::max);
        let curve_max = if self.has_part(PlotPart::Pdf) {
            self.pdf_curve().iter().map(|p| p.1).fold(0.0, f64::max)
        } else {
            0.0
        };
        let top = hist_max.max(curve_max);
        if top > 0.0 { 1.1 * top } else { 1.0 }
    }

    /// `Entries / ( <bin width> <unit> )`, without parentheses when there is no unit.
    pub fn y_label(&self) -> String {
        let per_bin = fmt_sig(self.hist.bin_width(), 1);
        let unit = &self.pdf.observable().unit;
        if unit.is_empty() {
            format!("Entries / {per_bin}")
        } else {
            format!("Entries / ( {per_bin} {unit} )")
        }
    }

    pub fn lower_label(&self) -> &'static str {
        if self.has_part(PlotPart::Pull) { "Pull" } else { "Residual" }
    }

    /// `<name> [<unit>]`.
    pub fn x_label(&self) -> String {
        let obs = self.pdf.observable();
        if obs.unit.is_empty() {
            obs.name.clone()
        } else {
            format!("{} [{}]", obs.name, obs.unit)
        }
    }
}

/// Composite models get pulls, components and a legend.
pub fn default_parts<P: Pdf + ?Sized>(pdf: &P) -> Vec<PlotPart> {
    if pdf.components().is_empty() {
        vec![PlotPart::Hist, PlotPart::Pdf, PlotPart::AxesLabels, PlotPart::Distribution]
    } else {
        vec![
            PlotPart::Hist,
            PlotPart::Pdf,
            PlotPart::Pull,
            PlotPart::Components,
            PlotPart::Legend,
            PlotPart::AxesLabels,
        ]
    }
}

fn data_range(data: &[f64]) -> (f64, f64) {
    let (lo, hi) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(*x), hi.max(*x)));
    if hi > lo { (lo, hi) } else { (lo - 0.5, hi + 0.5) }
}
