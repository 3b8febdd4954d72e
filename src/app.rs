//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments into run configuration
//! - runs fits, toy generation and plotting
//! - prints reports/plots and writes optional exports

use clap::Parser;
use log::{LevelFilter, debug, warn};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use crate::cli::{BinningArgs, Cli, Command, FitArgs, GenerateArgs, GetArgs, PlotArgs, SolverArgs};
use crate::domain::{FitConfig, GenerateConfig, PlotConfig};
use crate::error::AppError;
use crate::fit::{FitOptions, Tolerances};
use crate::models::Pdf;
use crate::plot::Plotter;

pub mod pipeline;

/// Environment variable overriding the log level (`error` .. `trace`).
pub const LOG_ENV: &str = "MINUFIT_LOG";

/// Entry point for the `minufit` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Generate(args) => handle_generate(args),
        Command::Plot(args) => handle_plot(args),
        Command::Get(args) => handle_get(args),
        Command::View(args) => crate::tui::run(args),
    }
}

/// Log level from the flags; `MINUFIT_LOG` wins when set and valid.
pub fn log_level(verbose: u8, quiet: bool, env: Option<&str>) -> LevelFilter {
    if let Some(level) = env.and_then(|v| v.trim().parse::<LevelFilter>().ok()) {
        return level;
    }
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let env = std::env::var(LOG_ENV).ok();
    let level = log_level(verbose, quiet, env.as_deref());
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();
    // A logger may already be installed (e.g. in tests).
    if TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto).is_err() {
        debug!("logger already initialized");
    }
}

pub fn fit_options_from_args(args: &SolverArgs) -> Result<FitOptions, AppError> {
    let options = FitOptions {
        strategy: args.strategy,
        line_search: args.line_search,
        tolerances: Tolerances::new(Some(args.tol_grad), Some(args.tol_cost), Some(args.max_iter))?,
        lbfgs_mem: args.lbfgs_mem,
        hesse: !args.no_hesse,
    };
    options.validate()?;
    Ok(options)
}

pub fn plot_config_from_args(args: &BinningArgs) -> PlotConfig {
    PlotConfig {
        nbins: args.nbins,
        xrange: args.xmin.zip(args.xmax),
        ascii_width: args.width,
        ascii_height: args.height,
        ..PlotConfig::default()
    }
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    Ok(FitConfig {
        model_path: args.input.model.clone(),
        data_path: args.input.data.clone(),
        column: args.input.column.clone(),
        options: fit_options_from_args(&args.solver)?,
        plot: plot_config_from_args(&args.binning),
        plot_path: args.plot.clone(),
        ascii: args.ascii,
        export_result: args.export.clone(),
    })
}

pub fn generate_config_from_args(args: &GenerateArgs) -> GenerateConfig {
    GenerateConfig {
        model_path: args.model.clone(),
        n_events: args.events,
        seed: args.seed,
        extended: args.extended,
        out: args.out.clone(),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    if let Some(path) = &config.plot_path {
        // fail before a long fit rather than after it
        crate::plot::svg::check_extension(path)?;
    }
    let run = pipeline::run_fit(&config)?;
    let model = run.inputs.model.as_ref();
    if !run.result.valid {
        warn!("Fit result is not valid: {}", run.result.status);
    }

    println!("{}", crate::report::format_fit_summary(&run.result));

    if config.ascii || config.plot_path.is_some() {
        let plotter = Plotter::new(model, &run.inputs.data.values, &config.plot)?;
        if config.ascii {
            println!(
                "{}",
                crate::plot::ascii::render_ascii(&plotter, config.plot.ascii_width, config.plot.ascii_height)
            );
        }
        if let Some(path) = &config.plot_path {
            crate::plot::svg::render_svg(&plotter, path, &config.plot)?;
        }
    }

    if let Some(path) = &config.export_result {
        crate::io::write_result_json(path, &run.result)?;
    }
    Ok(())
}

fn handle_generate(args: GenerateArgs) -> Result<(), AppError> {
    let config = generate_config_from_args(&args);
    let data = pipeline::run_generate(&config)?;
    println!("Wrote {} events to {}", data.len(), config.out.display());
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    if args.out.is_none() && !args.ascii {
        return Err(AppError::new(2, "Nothing to do: pass `--out <file.svg>` and/or `--ascii`."));
    }
    if let Some(path) = &args.out {
        crate::plot::svg::check_extension(path)?;
    }
    let config = plot_config_from_args(&args.binning);
    let mut inputs = pipeline::load_inputs(&args.input.model, &args.input.data, args.input.column.as_deref())?;
    if let Some(path) = &args.result {
        let result = crate::io::read_result_json(path)?;
        crate::io::apply_result(inputs.model.as_mut(), &result)?;
    }

    let model: &dyn Pdf = inputs.model.as_ref();
    let mut plotter = Plotter::new(model, &inputs.data.values, &config)?;
    if !args.parts.is_empty() {
        plotter = plotter.with_parts(args.parts.clone());
    }
    if args.ascii {
        println!(
            "{}",
            crate::plot::ascii::render_ascii(&plotter, config.ascii_width, config.ascii_height)
        );
    }
    if let Some(path) = &args.out {
        crate::plot::svg::render_svg(&plotter, path, &config)?;
    }
    Ok(())
}

fn handle_get(args: GetArgs) -> Result<(), AppError> {
    let result = crate::io::read_result_json(&args.result)?;
    print!("{}", crate::report::format_fit_summary(&result));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_from_flags_and_env() {
        assert_eq!(log_level(0, false, None), LevelFilter::Warn);
        assert_eq!(log_level(1, false, None), LevelFilter::Info);
        assert_eq!(log_level(5, false, None), LevelFilter::Trace);
        assert_eq!(log_level(0, true, None), LevelFilter::Error);
        assert_eq!(log_level(0, true, Some("debug")), LevelFilter::Debug);
        assert_eq!(log_level(2, false, Some("nonsense")), LevelFilter::Debug);
    }

    #[test]
    fn solver_flags_become_validated_options() {
        let cli = Cli::try_parse_from([
            "minufit", "fit", "-m", "m.json", "-d", "d.csv", "--max-iter", "50", "--nbins", "30",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args).unwrap();
        assert_eq!(config.options.tolerances.max_iter, Some(50));
        assert!(config.options.hesse);
        assert_eq!(config.plot.nbins, Some(30));
        assert_eq!(config.plot.xrange, None);

        let bad = Cli::try_parse_from(["minufit", "fit", "-m", "m.json", "-d", "d.csv", "--max-iter", "0"]).unwrap();
        let Command::Fit(args) = bad.command else {
            panic!("expected fit");
        };
        let err = fit_config_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
