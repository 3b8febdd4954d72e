//! SVG rendering via `plotters`.

use std::path::Path;

use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::PlotConfig;
use crate::error::{FitError, Result};
use crate::models::Pdf;
use crate::plot::{PULL_RANGE, PlotPart, Plotter};

/// Share of the figure height taken by the main panel when a lower panel is drawn.
const MAIN_PANEL_SHARE: f64 = 0.8;

fn plot_err<E: std::fmt::Display>(e: E) -> FitError {
    FitError::Plot(e.to_string())
}

fn rgb((r, g, b): (u8, u8, u8)) -> RGBColor {
    RGBColor(r, g, b)
}

/// Only `.svg` output is supported.
pub fn check_extension(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ext == "svg" {
        Ok(())
    } else {
        Err(FitError::UnsupportedPlotFormat(path.display().to_string()))
    }
}

/// Draw the plot into an SVG file at `path`.
pub fn render_svg<P: Pdf + ?Sized>(plotter: &Plotter<'_, P>, path: &Path, config: &PlotConfig) -> Result<()> {
    check_extension(path)?;
    let size = (config.svg_width.max(100), config.svg_height.max(100));
    {
        let root = SVGBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(plot_err)?;
        if plotter.has_lower_panel() {
            let split = (size.1 as f64 * MAIN_PANEL_SHARE) as u32;
            let (upper, lower) = root.split_vertically(split);
            draw_main(&upper, plotter, false)?;
            draw_lower(&lower, plotter)?;
        } else {
            draw_main(&root, plotter, true)?;
        }
        root.present().map_err(plot_err)?;
    }
    info!("Wrote plot to {}", path.display());
    Ok(())
}

fn draw_main<DB, P>(area: &DrawingArea<DB, Shift>, plotter: &Plotter<'_, P>, x_axis: bool) -> Result<()>
where
    DB: DrawingBackend,
    P: Pdf + ?Sized,
{
    let hist = plotter.hist();
    let (lo, hi) = hist.xlim;
    let labels = plotter.has_part(PlotPart::AxesLabels);

    let mut chart = ChartBuilder::on(area)
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, if x_axis { 40 } else { 20 })
        .build_cartesian_2d(lo..hi, 0f64..plotter.y_max())
        .map_err(plot_err)?;

    {
        let y_label = plotter.y_label();
        let x_label = plotter.x_label();
        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh().disable_y_mesh().x_labels(6).y_labels(6);
        if labels {
            mesh.y_desc(y_label.as_str());
            if x_axis {
                mesh.x_desc(x_label.as_str());
            }
        }
        mesh.draw().map_err(plot_err)?;
    }

    if plotter.has_part(PlotPart::Components) {
        for curve in plotter.component_curves() {
            let color = rgb(curve.color);
            chart
                .draw_series(
                    AreaSeries::new(curve.points.iter().copied(), 0.0, color.mix(0.3)).border_style(color),
                )
                .map_err(plot_err)?
                .label(curve.title.clone())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.mix(0.5).filled()));
        }
    }

    if plotter.has_part(PlotPart::Pdf) {
        chart
            .draw_series(LineSeries::new(plotter.pdf_curve(), BLACK.stroke_width(2)))
            .map_err(plot_err)?
            .label(plotter.pdf().title().to_string())
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 12, y)], BLACK.stroke_width(2)));
    }

    if plotter.has_part(PlotPart::Hist) {
        let half: Vec<f64> = hist.widths.iter().map(|w| 0.5 * w).collect();
        chart
            .draw_series(hist.centers.iter().zip(&hist.counts).zip(&hist.errors).map(|((x, n), e)| {
                ErrorBar::new_vertical(*x, (n - e).max(0.0), *n, n + e, BLACK.filled(), 4)
            }))
            .map_err(plot_err)?;
        chart
            .draw_series(
                hist.centers
                    .iter()
                    .zip(&hist.counts)
                    .zip(&half)
                    .map(|((x, n), h)| ErrorBar::new_horizontal(*n, x - h, *x, x + h, BLACK.filled(), 0)),
            )
            .map_err(plot_err)?;
    }

    if plotter.has_part(PlotPart::Distribution) {
        // rug of the raw data along the x axis
        let tick = 0.02 * plotter.y_max();
        let rug = BLUE.mix(0.1);
        chart
            .draw_series(
                plotter
                    .data()
                    .iter()
                    .filter(|x| **x >= lo && **x <= hi)
                    .map(|x| PathElement::new(vec![(*x, 0.0), (*x, tick)], rug)),
            )
            .map_err(plot_err)?;
    }

    if plotter.has_part(PlotPart::Legend) {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .draw()
            .map_err(plot_err)?;
    }
    Ok(())
}

fn draw_lower<DB, P>(area: &DrawingArea<DB, Shift>, plotter: &Plotter<'_, P>) -> Result<()>
where
    DB: DrawingBackend,
    P: Pdf + ?Sized,
{
    let hist = plotter.hist();
    let (lo, hi) = hist.xlim;
    let pull = plotter.has_part(PlotPart::Pull);
    let values = if pull { plotter.pulls() } else { plotter.residuals() };
    let (y_lo, y_hi) = if pull {
        PULL_RANGE
    } else {
        let m = hist
            .errors
            .iter()
            .zip(&values)
            .map(|(e, r)| r.abs() + e)
            .fold(1.0, f64::max);
        (-1.1 * m, 1.1 * m)
    };

    let mut chart = ChartBuilder::on(area)
        .margin_left(12)
        .margin_right(12)
        .margin_bottom(12)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(lo..hi, y_lo..y_hi)
        .map_err(plot_err)?;

    {
        let x_label = plotter.x_label();
        let mut mesh = chart.configure_mesh();
        mesh.disable_x_mesh().disable_y_mesh().x_labels(6).y_labels(3);
        if plotter.has_part(PlotPart::AxesLabels) {
            mesh.x_desc(x_label.as_str()).y_desc(plotter.lower_label());
        }
        mesh.draw().map_err(plot_err)?;
    }

    if pull {
        let gray = RGBColor(128, 128, 128).mix(0.5);
        chart
            .draw_series(hist.edges.windows(2).zip(&values).map(|(w, p)| {
                let v = p.clamp(y_lo, y_hi);
                Rectangle::new([(w[0], 0.0), (w[1], v)], gray.filled())
            }))
            .map_err(plot_err)?;
    } else {
        chart
            .draw_series(hist.centers.iter().zip(&values).zip(&hist.errors).map(|((x, r), e)| {
                ErrorBar::new_vertical(*x, r - e, *r, r + e, BLACK.filled(), 4)
            }))
            .map_err(plot_err)?;
    }
    chart
        .draw_series(LineSeries::new(vec![(lo, 0.0), (hi, 0.0)], BLACK.mix(0.6)))
        .map_err(plot_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chebyshev, Gauss};

    #[test]
    fn only_svg_is_accepted() {
        assert!(check_extension(Path::new("out.svg")).is_ok());
        assert!(check_extension(Path::new("OUT.SVG")).is_ok());
        assert!(matches!(
            check_extension(Path::new("out.png")),
            Err(FitError::UnsupportedPlotFormat(_))
        ));
        assert!(check_extension(Path::new("out")).is_err());
    }

    #[test]
    fn writes_svg_with_lower_panel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sum.svg");
        let obs = ("x", 0.0, 10.0);
        let sum = (Gauss::with_defaults(obs).unwrap() + Chebyshev::linear(obs).unwrap()).unwrap();
        let data: Vec<f64> = (0..200).map(|i| 0.05 * i as f64).collect();
        let plotter = Plotter::new(&sum, &data, &PlotConfig::default()).unwrap();
        render_svg(&plotter, &path, &PlotConfig::default()).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Pull"));
        assert!(svg.contains("gauss"));
    }

    #[test]
    fn writes_svg_for_a_simple_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gauss.svg");
        let g = Gauss::with_defaults(("x", -3.0, 3.0)).unwrap();
        let data: Vec<f64> = (0..100).map(|i| -1.0 + 0.02 * i as f64).collect();
        let plotter = Plotter::new(&g, &data, &PlotConfig::default()).unwrap();
        render_svg(&plotter, &path, &PlotConfig::default()).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Entries / "));
        assert!(!svg.contains("Pull"));
    }
}
