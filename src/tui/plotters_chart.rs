//! Plotters-powered fit chart widget for Ratatui.
//!
//! Plotters output is drawn into the Ratatui buffer through
//! `plotters-ratatui-backend`, so the terminal chart shares its drawing code
//! style with the SVG renderer.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::plot::ComponentCurve;

/// Render-only chart description; all series are computed before drawing.
pub struct FitChart<'a> {
    /// Bin centers with their entries.
    pub hist: &'a [(f64, f64)],
    /// Poisson error per bin, parallel to `hist`.
    pub errors: &'a [f64],
    /// Total model curve in entries per bin.
    pub curve: &'a [(f64, f64)],
    /// Scaled component curves; empty when hidden.
    pub components: &'a [ComponentCurve],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: &'a str,
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

impl<'a> Widget for FitChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            // Mesh lines clutter the low-resolution canvas.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc(self.x_label)
                .y_desc(self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            for component in self.components {
                let (r, g, b) = component.color;
                chart.draw_series(LineSeries::new(component.points.iter().copied(), &RGBColor(r, g, b)))?;
            }

            chart.draw_series(LineSeries::new(self.curve.iter().copied(), &RGBColor(0, 255, 255)))?;

            // Error bars as plain paths, then the bin contents on top. `Circle`
            // radii come out far too large on this backend, so points are pixels.
            chart.draw_series(
                self.hist
                    .iter()
                    .zip(self.errors)
                    .filter(|(_, e)| **e > 0.0)
                    .map(|(&(x, y), &e)| PathElement::new(vec![(x, (y - e).max(y0)), (x, (y + e).min(y1))], &WHITE)),
            )?;
            chart.draw_series(self.hist.iter().map(|&(x, y)| Pixel::new((x, y), WHITE)))?;

            Ok(())
        });

        widget.render(area, buf);
    }
}
