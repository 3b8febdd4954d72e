//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, meant for quick visual checks:
//! - histogram entries: `o`
//! - model curve: `-`
//! - component curves: `1`, `2`, ... (with the `components` part)
//! - pulls (with the `pull` part): one extra row, `+`/`-` beyond one sigma,
//!   `!` beyond the pull range

use crate::models::Pdf;
use crate::plot::{PULL_RANGE, PlotPart, Plotter};
use crate::report::fmt_sig;

/// Render the plot into a `width` x `height` grid with a header line.
pub fn render_ascii<P: Pdf + ?Sized>(plotter: &Plotter<'_, P>, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);
    let hist = plotter.hist();
    let (x_min, x_max) = hist.xlim;
    let (y_min, y_max) = (0.0, plotter.y_max());

    let mut grid = vec![vec![' '; width]; height];

    if plotter.has_part(PlotPart::Components) {
        for (i, curve) in plotter.component_curves().iter().enumerate() {
            let ch = char::from_digit(((i + 1) % 10) as u32, 10).unwrap_or('*');
            let points = downsample(&curve.points, width);
            draw_curve(&mut grid, &points, (x_min, x_max), (y_min, y_max), ch);
        }
    }
    if plotter.has_part(PlotPart::Pdf) {
        let points = downsample(&plotter.pdf_curve(), width);
        draw_curve(&mut grid, &points, (x_min, x_max), (y_min, y_max), '-');
    }
    if plotter.has_part(PlotPart::Hist) {
        for (x, n) in hist.centers.iter().zip(&hist.counts) {
            let col = map_x(*x, x_min, x_max, width);
            let row = map_y(*n, y_min, y_max, height);
            grid[row][col] = 'o';
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {} in [{}, {}] | {} | max={}\n",
        plotter.x_label(),
        fmt_sig(x_min, 4),
        fmt_sig(x_max, 4),
        plotter.y_label(),
        fmt_sig(y_max, 3),
    ));
    for row in grid {
        out.push_str(row.into_iter().collect::<String>().trim_end());
        out.push('\n');
    }
    if plotter.has_part(PlotPart::Pull) {
        out.push_str(&pull_row(plotter, width));
        out.push('\n');
    }
    out
}

fn pull_row<P: Pdf + ?Sized>(plotter: &Plotter<'_, P>, width: usize) -> String {
    let hist = plotter.hist();
    let (x_min, x_max) = hist.xlim;
    let mut row = vec![' '; width];
    for (x, pull) in hist.centers.iter().zip(plotter.pulls()) {
        let ch = if pull < PULL_RANGE.0 || pull > PULL_RANGE.1 {
            '!'
        } else if pull > 1.0 {
            '+'
        } else if pull < -1.0 {
            '-'
        } else {
            '.'
        };
        row[map_x(*x, x_min, x_max, width)] = ch;
    }
    row.into_iter().collect::<String>().trim_end().to_string()
}

/// Keep about two points per column.
fn downsample(points: &[(f64, f64)], width: usize) -> Vec<(f64, f64)> {
    let step = (points.len() / (2 * width).max(1)).max(1);
    let mut out: Vec<(f64, f64)> = points.iter().step_by(step).copied().collect();
    if let Some(last) = points.last() {
        if out.last() != Some(last) {
            out.push(*last);
        }
    }
    out
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // top row is y_max
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], xs: (f64, f64), ys: (f64, f64), ch: char) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        let col = map_x(x, xs.0, xs.1, width);
        let row = map_y(y, ys.0, ys.1, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, (c0, r0), (col, row), ch),
            None => grid[row][col] = ch,
        }
        prev = Some((col, row));
    }
}

/// Bresenham line; only fills empty cells.
fn draw_line(grid: &mut [Vec<char>], from: (usize, usize), to: (usize, usize), ch: char) {
    let (mut x0, mut y0) = (from.0 as isize, from.1 as isize);
    let (x1, y1) = (to.0 as isize, to.1 as isize);

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        let inside = y0 >= 0 && (y0 as usize) < grid.len() && x0 >= 0 && (x0 as usize) < grid[0].len();
        if inside && grid[y0 as usize][x0 as usize] == ' ' {
            grid[y0 as usize][x0 as usize] = ch;
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlotConfig;
    use crate::models::{Chebyshev, Gauss};

    #[test]
    fn grid_has_requested_size() {
        let g = Gauss::with_defaults(("x", -3.0, 3.0)).unwrap();
        let data: Vec<f64> = (0..400).map(|i| -2.0 + 0.01 * i as f64).collect();
        let p = Plotter::new(&g, &data, &PlotConfig::default()).unwrap();
        let txt = render_ascii(&p, 40, 10);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 11);
        assert!(lines[0].starts_with("Plot: x in [-2, 1.99]"));
        assert!(lines[1..].iter().all(|l| l.chars().count() <= 40));
        assert!(txt.contains('o'));
        assert!(txt.contains('-'));
    }

    #[test]
    fn composite_adds_components_and_pull_row() {
        let obs = ("x", 0.0, 1.0);
        let sum = (Gauss::with_defaults(obs).unwrap() + Chebyshev::linear(obs).unwrap()).unwrap();
        let data: Vec<f64> = (0..300).map(|i| (i as f64 + 0.5) / 300.0).collect();
        let p = Plotter::new(&sum, &data, &PlotConfig::default()).unwrap();
        let txt = render_ascii(&p, 30, 8);
        assert_eq!(txt.lines().count(), 10);
        assert!(txt.contains('1'));
        assert!(txt.contains('2'));
    }

    #[test]
    fn mapping_puts_maximum_on_top_row() {
        assert_eq!(map_x(0.0, 0.0, 1.0, 10), 0);
        assert_eq!(map_x(1.0, 0.0, 1.0, 10), 9);
        assert_eq!(map_y(1.0, 0.0, 1.0, 5), 0);
        assert_eq!(map_y(0.0, 0.0, 1.0, 5), 4);
        assert_eq!(downsample(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)], 10).len(), 3);
    }
}
