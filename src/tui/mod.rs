//! Ratatui-based terminal viewer.
//!
//! The viewer loads a model and a dataset, fits once on start, then shows the
//! binned data with the fitted curve next to the parameter table. Keys toggle
//! the component curves, change the binning and refit.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::warn;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::app::pipeline::{Inputs, load_inputs};
use crate::cli::ViewArgs;
use crate::domain::PlotConfig;
use crate::error::AppError;
use crate::fit::{FitOptions, FitResult, fit};
use crate::plot::{ComponentCurve, Plotter};
use crate::report::{fmt_sig, format_parameters};

mod plotters_chart;

use plotters_chart::FitChart;

/// Bins added or removed per `+`/`-` press.
const BIN_STEP: usize = 5;

/// Start the viewer.
pub fn run(args: ViewArgs) -> Result<(), AppError> {
    let options = crate::app::fit_options_from_args(&args.solver)?;
    let inputs = load_inputs(&args.input.model, &args.input.data, args.input.column.as_deref())?;
    let mut app = App::new(inputs, options, args.nbins)?;

    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    app.refit();
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Chart series for the current model state and binning.
#[derive(Debug, Clone, PartialEq)]
struct ChartData {
    hist: Vec<(f64, f64)>,
    errors: Vec<f64>,
    curve: Vec<(f64, f64)>,
    components: Vec<ComponentCurve>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    x_label: String,
    y_label: String,
}

struct App {
    inputs: Inputs,
    options: FitOptions,
    nbins: usize,
    show_components: bool,
    status: String,
    result: Option<FitResult>,
    chart: Option<ChartData>,
}

impl App {
    fn new(inputs: Inputs, options: FitOptions, nbins: Option<usize>) -> Result<Self, AppError> {
        // Resolve the default bin count once so `+`/`-` have a starting point.
        let nbins = match nbins {
            Some(n) => n.max(1),
            None => Plotter::new(inputs.model.as_ref(), &inputs.data.values, &PlotConfig::default())?
                .hist()
                .nbins(),
        };
        let mut app = Self {
            inputs,
            options,
            nbins,
            show_components: true,
            status: "Fitting...".to_string(),
            result: None,
            chart: None,
        };
        app.rebuild_chart();
        Ok(app)
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the viewer should exit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') => {
                self.show_components = !self.show_components;
                self.status = format!("components: {}", if self.show_components { "on" } else { "off" });
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.nbins = self.nbins.saturating_add(BIN_STEP);
                self.rebuild_chart();
                self.status = format!("bins: {}", self.nbins);
            }
            KeyCode::Char('-') => {
                self.nbins = self.nbins.saturating_sub(BIN_STEP).max(1);
                self.rebuild_chart();
                self.status = format!("bins: {}", self.nbins);
            }
            KeyCode::Char('r') => self.refit(),
            _ => {}
        }
        false
    }

    /// Fit from the current parameter values. Failures stay in the status line.
    fn refit(&mut self) {
        match fit(self.inputs.model.as_mut(), &self.inputs.data.values, &self.options) {
            Ok(result) => {
                self.status = format!(
                    "{} after {} iterations, NLL = {}",
                    if result.valid { "Fit valid" } else { "Fit INVALID" },
                    result.iterations,
                    fmt_sig(result.nll, 8)
                );
                self.result = Some(result);
            }
            Err(e) => {
                warn!("Fit failed: {e}");
                self.status = format!("Fit failed: {e}");
            }
        }
        self.rebuild_chart();
    }

    fn rebuild_chart(&mut self) {
        match chart_data(&self.inputs, self.nbins) {
            Ok(data) => self.chart = Some(data),
            Err(e) => {
                self.chart = None;
                self.status = format!("Plot error: {e}");
            }
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_body(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let model = self.inputs.model.as_ref();
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("minufit", Style::default().fg(Color::Cyan)),
            Span::raw(format!(" | {} ({})", model.name(), model.title())),
        ]));

        let fit_line = match &self.result {
            Some(r) => format!(
                "n={} | dropped={} | NLL={} | strategy: {:?} | evals={}",
                r.n_events,
                r.n_dropped,
                fmt_sig(r.nll, 8),
                r.strategy,
                r.fn_evals
            ),
            None => format!("n={} | not fitted", self.inputs.data.values.len()),
        };
        lines.push(Line::from(Span::styled(fit_line, Style::default().fg(Color::Gray))));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_body(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(64)])
            .split(area);

        self.draw_chart(frame, chunks[0]);
        self.draw_parameters(frame, chunks[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(format!("Fit ({} bins)", self.nbins))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(data) = &self.chart else {
            let msg = Paragraph::new("Nothing to plot.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let components: &[ComponentCurve] = if self.show_components { &data.components } else { &[] };
        let (chart_rect, insets) = chart_layout(inner);
        let widget = FitChart {
            hist: &data.hist,
            errors: &data.errors,
            curve: &data.curve,
            components,
            x_bounds: data.x_bounds,
            y_bounds: data.y_bounds,
            x_label: &data.x_label,
            y_label: &data.y_label,
            fmt_x: fmt_axis,
            fmt_y: fmt_axis,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, data);
        }
    }

    fn draw_parameters(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut text = format_parameters(self.inputs.model.as_ref());
        if self.show_components {
            let legend = self
                .chart
                .iter()
                .flat_map(|c| &c.components)
                .map(|c| format!("\n  {} {}", color_swatch(c.color), c.title))
                .collect::<String>();
            if !legend.is_empty() {
                text.push_str("\nComponents:");
                text.push_str(&legend);
            }
        }
        let p = Paragraph::new(text).block(Block::default().title("Parameters").borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "c components  +/- bins  r refit  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Build the chart series; the y range starts at zero like the SVG plot.
fn chart_data(inputs: &Inputs, nbins: usize) -> crate::error::Result<ChartData> {
    let config = PlotConfig {
        nbins: Some(nbins),
        ..PlotConfig::default()
    };
    let plotter = Plotter::new(inputs.model.as_ref(), &inputs.data.values, &config)?;
    let hist = plotter.hist();
    Ok(ChartData {
        hist: hist.centers.iter().copied().zip(hist.counts.iter().copied()).collect(),
        errors: hist.errors.clone(),
        curve: plotter.pdf_curve(),
        components: plotter.component_curves(),
        x_bounds: [hist.xlim.0, hist.xlim.1],
        y_bounds: [0.0, plotter.y_max()],
        x_label: plotter.x_label(),
        y_label: plotter.y_label(),
    })
}

fn color_swatch((r, g, b): (u8, u8, u8)) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

fn fmt_axis(v: f64) -> String {
    fmt_sig(v, 3)
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 8,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(frame: &mut ratatui::Frame<'_>, inner: Rect, chart: Rect, insets: AxisInsets, data: &ChartData) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let [x0, x1] = data.x_bounds;
    let [y0, y1] = data.y_bounds;

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = fmt_axis(x0 + u * (x1 - x0));
        let label_len = label.len() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis(y0 + u * (y1 - y0));
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(data.x_label.as_str())
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label = Paragraph::new(data.y_label.as_str())
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: chart.width.min(inner.width),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
