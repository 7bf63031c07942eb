//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    build_analysis_config, build_parameter_grid, scan_lookback_days,
};
use crate::domain::error::EdgefinderError;
use crate::domain::optimizer::{ParameterGrid, WalkForwardResult};
use crate::domain::scan::{OptimizeRequest, ScanReport, ScanRequest, ScanService};
use crate::domain::statistics::PatternStatistics;
use crate::domain::strategy::StrategyRegistry;
use crate::ports::config_port::ConfigPort;
use crate::ports::statistics_store::StatisticsStore;

#[derive(Parser, Debug)]
#[command(name = "edgefinder", about = "Intraday pattern discovery and walk-forward validation")]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect, simulate and rank every pattern over recent sessions
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV file or directory, overriding [data] path
        #[arg(long)]
        data: Option<PathBuf>,
        #[arg(long)]
        lookback_days: Option<u32>,
        /// Persist statistics to the [sqlite] store
        #[arg(long)]
        store: bool,
        #[arg(long)]
        json: bool,
    },
    /// Walk-forward optimize one strategy's parameters
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: String,
        /// INI file with a [grid] section
        #[arg(long)]
        grid: Option<PathBuf>,
        #[arg(long)]
        top_n: Option<usize>,
        #[arg(long)]
        data: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Show profitable patterns from a stored scan
    Stored {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        lookback_days: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// List optimizable strategies and their default grids
    Strategies,
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Install the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "edgefinder=debug" } else { "edgefinder=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Scan {
            config,
            data,
            lookback_days,
            store,
            json,
        } => run_scan(&config, data.as_deref(), lookback_days, store, json),
        Command::Optimize {
            config,
            strategy,
            grid,
            top_n,
            data,
            json,
        } => run_optimize(&config, &strategy, grid.as_deref(), top_n, data.as_deref(), json),
        Command::Stored {
            config,
            lookback_days,
            json,
        } => run_stored(&config, lookback_days, json),
        Command::Strategies => {
            print_strategies(&StrategyRegistry::with_builtins());
            Ok(())
        }
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, EdgefinderError> {
    FileConfigAdapter::from_file(path).map_err(|e| EdgefinderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// CSV source from `--data`, else `[data] path`. Directories hold `{symbol}_{interval}.csv`.
pub fn data_source(
    config: &dyn ConfigPort,
    data_override: Option<&Path>,
) -> Result<CsvAdapter, EdgefinderError> {
    let path = match data_override {
        Some(p) => p.to_path_buf(),
        None => config
            .get_string("data", "path")
            .map(PathBuf::from)
            .ok_or_else(|| EdgefinderError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?,
    };
    if path.is_dir() {
        Ok(CsvAdapter::new(path))
    } else {
        Ok(CsvAdapter::from_file(path))
    }
}

/// Run `f` with the configured statistics store, if any.
fn with_store<T>(
    config: &dyn ConfigPort,
    f: impl FnOnce(Option<&dyn StatisticsStore>) -> Result<T, EdgefinderError>,
) -> Result<T, EdgefinderError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        if config.get_string("sqlite", "path").is_some() {
            let store = SqliteAdapter::from_config(config)?;
            let port: &dyn StatisticsStore = &store;
            return f(Some(port));
        }
    }
    #[cfg(not(feature = "sqlite"))]
    let _ = config;
    f(None)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), EdgefinderError> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{}", text);
    Ok(())
}

fn run_scan(
    config_path: &Path,
    data_override: Option<&Path>,
    lookback_override: Option<u32>,
    store: bool,
    json: bool,
) -> Result<(), EdgefinderError> {
    let adapter = load_config(config_path)?;
    let analysis = build_analysis_config(&adapter)?;
    let lookback_days = match lookback_override {
        Some(days) => days,
        None => scan_lookback_days(&adapter)?,
    };
    if store && adapter.get_string("sqlite", "path").is_none() {
        return Err(EdgefinderError::ConfigMissing {
            section: "sqlite".into(),
            key: "path".into(),
        });
    }
    let data = data_source(&adapter, data_override)?;

    let report = with_store(&adapter, |store_port| {
        let service = ScanService::new(&data, store_port, analysis);
        service.scan(&ScanRequest {
            lookback_days,
            store_results: store,
        })
    })?;

    if json {
        print_json(&report)
    } else {
        print_scan_report(&report);
        Ok(())
    }
}

fn run_optimize(
    config_path: &Path,
    strategy_id: &str,
    grid_path: Option<&Path>,
    top_n: Option<usize>,
    data_override: Option<&Path>,
    json: bool,
) -> Result<(), EdgefinderError> {
    let adapter = load_config(config_path)?;
    let mut analysis = build_analysis_config(&adapter)?;
    if let Some(n) = top_n {
        analysis.walk_forward.top_n = n.max(1);
    }

    let parameter_grid: Option<ParameterGrid> = match grid_path {
        Some(path) => Some(build_parameter_grid(&load_config(path)?, "grid")?),
        None if !adapter.section_keys("grid").is_empty() => {
            Some(build_parameter_grid(&adapter, "grid")?)
        }
        None => None,
    };
    let data = data_source(&adapter, data_override)?;

    let service = ScanService::new(&data, None, analysis);
    let result = service.optimize(&OptimizeRequest {
        strategy_id: strategy_id.to_string(),
        parameter_grid,
    })?;

    if json {
        print_json(&result)
    } else {
        print_walk_forward(&result);
        Ok(())
    }
}

fn run_stored(
    config_path: &Path,
    lookback_override: Option<u32>,
    json: bool,
) -> Result<(), EdgefinderError> {
    let adapter = load_config(config_path)?;
    let analysis = build_analysis_config(&adapter)?;
    let lookback_days = match lookback_override {
        Some(days) => days,
        None => scan_lookback_days(&adapter)?,
    };
    let data = data_source(&adapter, None).unwrap_or_else(|_| CsvAdapter::new(PathBuf::from(".")));

    let stats = with_store(&adapter, |store_port| {
        ScanService::new(&data, store_port, analysis).stored_profitable_patterns(lookback_days)
    })?;

    if json {
        print_json(&stats)
    } else {
        println!("Stored profitable patterns ({} day look-back)", lookback_days);
        print_statistics_table(&stats);
        Ok(())
    }
}

fn run_validate(config_path: &Path) -> Result<(), EdgefinderError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    let analysis = build_analysis_config(&adapter)?;
    let lookback_days = scan_lookback_days(&adapter)?;
    if !adapter.section_keys("grid").is_empty() {
        let grid = build_parameter_grid(&adapter, "grid")?;
        eprintln!("  grid: {} combinations", grid.len());
    }

    eprintln!("  symbol: {} ({})", analysis.symbol, analysis.interval);
    eprintln!("  min bars: {}", analysis.min_bars);
    eprintln!("  indicator warm-up: {} bars", analysis.indicators.warmup_bars());
    eprintln!("  scan look-back: {} days", lookback_days);
    eprintln!("  tie-break: {:?}", analysis.simulation.tie_break);
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

pub fn print_strategies(registry: &StrategyRegistry) {
    for generator in registry.iter() {
        let grid = generator.default_grid();
        println!("{:<24} {}", generator.id(), generator.description());
        println!(
            "{:<24} tunables: {} ({} combinations)",
            "",
            grid.tunables().collect::<Vec<_>>().join(", "),
            grid.len()
        );
    }
}

fn print_statistics_table(stats: &[PatternStatistics]) {
    if stats.is_empty() {
        println!("  (none)");
        return;
    }
    println!(
        "  {:<36} {:<5} {:>5} {:>7} {:>8} {:>11} {:>6}",
        "pattern", "dir", "n", "win%", "pf", "expectancy", "conf"
    );
    for s in stats {
        println!(
            "  {:<36} {:<5} {:>5} {:>6.1}% {:>8.2} {:>11.2} {:>6.0}",
            s.pattern_id,
            s.direction,
            s.sample_size,
            s.win_rate * 100.0,
            s.profit_factor,
            s.expectancy,
            s.confidence
        );
    }
}

fn print_scan_report(report: &ScanReport) {
    match &report.regime {
        Some(r) => println!(
            "Regime: {:?} (strength {:.0}, fast slope {:.2}%, slow slope {:.2}%)",
            r.regime, r.trend_strength, r.fast_slope_pct, r.slow_slope_pct
        ),
        None => println!("Regime: unknown (insufficient history)"),
    }
    println!(
        "Bars: {}  patterns: {}  trades: {}",
        report.bars_analyzed, report.patterns_detected, report.trades_simulated
    );
    println!("\nRecommended:");
    print_statistics_table(&report.recommended_patterns);
    println!("\nCounter-trend:");
    print_statistics_table(&report.counter_trend_patterns);
    if report.stored > 0 {
        println!("\nStored {} statistics records.", report.stored);
    }
}

fn print_walk_forward(result: &WalkForwardResult) {
    println!(
        "Strategy: {}  ({} combinations, train bars {}..{}, test bars {}..{})",
        result.strategy_id,
        result.combinations_evaluated,
        result.train_range.0,
        result.train_range.1,
        result.test_range.0,
        result.test_range.1
    );
    println!("\nTraining ranking:");
    for (rank, entry) in result.train_ranking.iter().enumerate() {
        println!(
            "  {:>2}. score {:>9.3}  pf {:>7.2}  trades {:>4}  [{}]",
            rank + 1,
            entry.metrics.score,
            entry.metrics.profit_factor,
            entry.metrics.trades,
            entry.params
        );
    }
    let t = &result.test_result;
    println!(
        "\nOut-of-sample: trades {}  win {:.1}%  pf {:.2}  expectancy {:.2}  sharpe {:.2}",
        t.trades,
        t.win_rate * 100.0,
        t.profit_factor,
        t.expectancy,
        t.sharpe
    );
    println!("Recommendation: {:?}", result.recommendation);
}
