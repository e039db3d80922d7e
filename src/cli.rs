//! CLI definition and dispatch.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, TIMESTAMP_FORMAT};
use crate::adapters::csv_result_adapter::CsvResultAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::SentraderError;
use crate::domain::metrics::Metrics;
use crate::domain::simulator::{self, BacktestConfig};
use crate::domain::strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::result_port::ResultPort;

#[derive(Parser, Debug)]
#[command(name = "sentrader", about = "OHLCV signal backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and export rows and metrics
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(short, long)]
        strategy: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without fetching data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored data range for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// List symbols known to the data store
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Import a CSV bar file into the SQLite store
    ImportCsv {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        timeframe: String,
        #[arg(long)]
        provider: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            symbol,
            timeframe,
            strategy,
            output,
        } => run_backtest(
            &config,
            symbol.as_deref(),
            timeframe.as_deref(),
            strategy.as_deref(),
            output.as_ref(),
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            config,
            symbol,
            timeframe,
        } => run_info(&config, symbol.as_deref(), timeframe.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::ImportCsv {
            config,
            file,
            symbol,
            timeframe,
            provider,
        } => run_import_csv(&config, &file, &symbol, &timeframe, provider.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    symbol_override: Option<&str>,
    timeframe_override: Option<&str>,
) -> Result<BacktestConfig, SentraderError> {
    let symbol = match symbol_override {
        Some(s) => s.to_string(),
        None => adapter
            .get_string("backtest", "symbol")
            .ok_or_else(|| SentraderError::ConfigMissing {
                section: "backtest".into(),
                key: "symbol".into(),
            })?,
    };
    let timeframe = match timeframe_override {
        Some(t) => t.to_string(),
        None => adapter
            .get_string("backtest", "timeframe")
            .unwrap_or_else(|| "1d".to_string()),
    };
    let provider = adapter
        .get_string("backtest", "provider")
        .unwrap_or_else(|| "generic".to_string());

    let start = parse_datetime_key(adapter, "backtest", "start")?;
    let end = parse_datetime_key(adapter, "backtest", "end")?;
    if end < start {
        return Err(SentraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "end".into(),
            reason: "end precedes start".into(),
        });
    }

    Ok(BacktestConfig {
        symbol,
        timeframe,
        provider,
        start,
        end,
        initial_balance: adapter.get_double("backtest", "initial_balance", 100_000.0),
        fee_rate: adapter.get_double("backtest", "fee_rate", 0.0),
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", 0.0),
    })
}

fn parse_datetime_key(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDateTime, SentraderError> {
    let raw = adapter
        .get_string(section, key)
        .ok_or_else(|| SentraderError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|_| {
        SentraderError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: "invalid datetime format (expected YYYY-MM-DD HH:MM:SS)".into(),
        }
    })
}

fn build_data_port(config: &FileConfigAdapter) -> Result<Box<dyn DataPort>, SentraderError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());

    match source.as_str() {
        "csv" => {
            let base = config
                .get_string("data", "path")
                .unwrap_or_else(|| ".".to_string());
            Ok(Box::new(CsvAdapter::new(PathBuf::from(base))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            let adapter = SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            Ok(Box::new(adapter))
        }
        #[cfg(not(feature = "sqlite"))]
        "sqlite" => Err(SentraderError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "sqlite feature is not enabled".into(),
        }),
        other => Err(SentraderError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unknown data source '{other}'"),
        }),
    }
}

fn run_backtest(
    config_path: &PathBuf,
    symbol_override: Option<&str>,
    timeframe_override: Option<&str>,
    strategy_override: Option<&str>,
    output_dir: Option<&PathBuf>,
) -> Result<(), SentraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = FileConfigAdapter::from_file(config_path)?;

    let bt_config = build_backtest_config(&adapter, symbol_override, timeframe_override)?;
    let strategy = strategy::from_config(&adapter, strategy_override)?;
    eprintln!("Strategy: {}", strategy.name());

    let data_port = build_data_port(&adapter)?;

    eprintln!(
        "Fetching {} {} ({} to {})",
        bt_config.symbol, bt_config.timeframe, bt_config.start, bt_config.end
    );
    let bars = data_port.fetch_ohlcv(
        &bt_config.symbol,
        &bt_config.timeframe,
        &bt_config.provider,
        bt_config.start,
        bt_config.end,
    )?;
    if bars.is_empty() {
        return Err(SentraderError::NoData {
            symbol: bt_config.symbol.clone(),
            timeframe: bt_config.timeframe.clone(),
        });
    }
    eprintln!("  {} bars loaded", bars.len());

    let signals = strategy.generate_signals(&bars);
    let result = simulator::run(
        &bars,
        &signals,
        bt_config.initial_balance,
        bt_config.fee_rate,
    )?;

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }

    let metrics = Metrics::from_rows(&result.rows, bt_config.risk_free_rate)?;

    eprintln!("\n=== Results ===");
    eprintln!("Final Equity:     {:.2}", result.final_equity());
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     {:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.num_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.winrate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Time in Market:   {:.1}%", metrics.time_in_market * 100.0);

    let out_dir = output_dir.cloned().unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)?;
    let rows_path = out_dir.join(format!(
        "backtest_{}_{}.csv",
        bt_config.symbol, bt_config.timeframe
    ));
    let metrics_path = out_dir.join(format!(
        "metrics_{}_{}.json",
        bt_config.symbol, bt_config.timeframe
    ));

    let result_port = CsvResultAdapter::new();
    result_port.write_rows(&result.rows, &rows_path)?;
    result_port.write_metrics(&metrics, &metrics_path)?;

    eprintln!("\nRows written to:    {}", rows_path.display());
    eprintln!("Metrics written to: {}", metrics_path.display());
    Ok(())
}

fn run_validate(config_path: &PathBuf) -> Result<(), SentraderError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = FileConfigAdapter::from_file(config_path)?;

    let bt_config = build_backtest_config(&adapter, None, None)?;
    let strategy = strategy::from_config(&adapter, None)?;
    build_data_port(&adapter)?;

    eprintln!("  symbol:    {}", bt_config.symbol);
    eprintln!("  timeframe: {}", bt_config.timeframe);
    eprintln!("  range:     {} to {}", bt_config.start, bt_config.end);
    eprintln!("  strategy:  {}", strategy.name());
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_info(
    config_path: &PathBuf,
    symbol_override: Option<&str>,
    timeframe_override: Option<&str>,
) -> Result<(), SentraderError> {
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let bt_config = build_backtest_config(&adapter, symbol_override, timeframe_override)?;
    let data_port = build_data_port(&adapter)?;

    match data_port.get_data_range(
        &bt_config.symbol,
        &bt_config.timeframe,
        &bt_config.provider,
    )? {
        Some((min, max, count)) => {
            println!(
                "{} {}: {} bars, {} to {}",
                bt_config.symbol, bt_config.timeframe, count, min, max
            );
        }
        None => {
            eprintln!(
                "{} {}: no data found",
                bt_config.symbol, bt_config.timeframe
            );
        }
    }
    Ok(())
}

fn run_list_symbols(config_path: &PathBuf) -> Result<(), SentraderError> {
    let adapter = FileConfigAdapter::from_file(config_path)?;
    let data_port = build_data_port(&adapter)?;

    let symbols = data_port.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_import_csv(
    config_path: &PathBuf,
    file: &PathBuf,
    symbol: &str,
    timeframe: &str,
    provider: Option<&str>,
) -> Result<(), SentraderError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::csv_adapter::parse_bars;
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let config = FileConfigAdapter::from_file(config_path)?;
        let provider = provider.unwrap_or("generic");

        eprintln!("Importing {} as {} {}", file.display(), symbol, timeframe);
        let content = std::fs::read_to_string(file)?;
        let bars = parse_bars(&content)?;

        let adapter = SqliteAdapter::from_config(&config)?;
        adapter.initialize_schema()?;
        adapter.insert_bars(symbol, timeframe, provider, &bars)?;

        eprintln!("{} bars imported", bars.len());
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, file, symbol, timeframe, provider);
        Err(SentraderError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "sqlite feature is required for import-csv".into(),
        })
    }
}
