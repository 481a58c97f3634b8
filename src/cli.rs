//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestResult};
use crate::domain::config_validation::{
    check_warmup, validate_backtest_section, validate_candles, validate_config,
    validate_risk_section, warmup_required,
};
use crate::domain::error::BacktestError;
use crate::domain::execution::{FillTiming, IntrabarPolicy};
use crate::domain::risk::{LevelRule, PositionSizingMode, RiskConfig};
use crate::domain::strategies::build_strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_TRADES_PATH: &str = "trades.csv";

#[derive(Parser, Debug)]
#[command(name = "candle-backtest", about = "Single-instrument candle backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Candle CSV, overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Trade ledger CSV, overrides [report] trades_path
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the range and shape of a candle file
    Info {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, data.as_deref())
            } else {
                run_backtest(&config, data.as_deref(), output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { data } => run_info(&data),
    }
}

fn fail(err: BacktestError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Relative paths in the config file are taken from the config's directory.
fn resolve_relative(config_path: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        return path;
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path,
    }
}

/// `--data` if given, else `[data] path`.
pub fn resolve_data_path(
    config: &dyn ConfigPort,
    config_path: &Path,
    data_override: Option<&Path>,
) -> Result<PathBuf, BacktestError> {
    if let Some(path) = data_override {
        return Ok(path.to_path_buf());
    }
    let value = config.require_string("data", "path")?;
    Ok(resolve_relative(config_path, &value))
}

/// `--output` if given, else `[report] trades_path`, else `trades.csv`.
pub fn resolve_trades_path(
    config: &dyn ConfigPort,
    config_path: &Path,
    output_override: Option<&Path>,
) -> PathBuf {
    if let Some(path) = output_override {
        return path.to_path_buf();
    }
    match config.get_string("report", "trades_path") {
        Some(value) if !value.trim().is_empty() => resolve_relative(config_path, value.trim()),
        _ => PathBuf::from(DEFAULT_TRADES_PATH),
    }
}

fn level_rule(
    config: &dyn ConfigPort,
    pct_key: &str,
    atr_key: &str,
) -> Result<LevelRule, BacktestError> {
    match (config.get_f64("risk", pct_key)?, config.get_f64("risk", atr_key)?) {
        (Some(_), Some(_)) => Err(BacktestError::InvalidConfig {
            key: pct_key.to_string(),
            reason: format!("{pct_key} and {atr_key} are mutually exclusive"),
        }),
        (Some(pct), None) => Ok(LevelRule::Percent(pct)),
        (None, Some(mult)) => Ok(LevelRule::AtrMultiple(mult)),
        (None, None) => Ok(LevelRule::Disabled),
    }
}

/// Build the engine's [`RiskConfig`] from `[backtest]` and `[risk]`.
/// Absent optional keys take the [`RiskConfig::default`] values.
pub fn build_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, BacktestError> {
    validate_backtest_section(config)?;
    validate_risk_section(config)?;

    let defaults = RiskConfig::default();
    let starting_balance = config
        .get_f64("backtest", "starting_balance")?
        .ok_or_else(|| BacktestError::ConfigMissing {
            section: "backtest".to_string(),
            key: "starting_balance".to_string(),
        })?;

    let fill_timing = match config.get_string("backtest", "fill_timing") {
        Some(s) => FillTiming::parse(&s)
            .ok_or_else(|| BacktestError::InvalidConfig {
                key: "fill_timing".to_string(),
                reason: format!("unknown fill_timing {s:?}"),
            })?,
        None => defaults.fill_timing,
    };
    let intrabar_policy = match config.get_string("backtest", "intrabar_policy") {
        Some(s) => IntrabarPolicy::parse(&s).ok_or_else(|| BacktestError::InvalidConfig {
            key: "intrabar_policy".to_string(),
            reason: format!("unknown intrabar_policy {s:?}"),
        })?,
        None => defaults.intrabar_policy,
    };
    let position_sizing = match config.get_string("risk", "position_sizing") {
        Some(s) => PositionSizingMode::parse(&s).ok_or_else(|| BacktestError::InvalidConfig {
            key: "position_sizing".to_string(),
            reason: format!("unknown position_sizing {s:?}"),
        })?,
        None => defaults.position_sizing,
    };

    let risk = RiskConfig {
        starting_balance,
        stop_loss: level_rule(config, "stop_loss_pct", "stop_loss_atr_mult")?,
        take_profit: level_rule(config, "take_profit_pct", "take_profit_atr_mult")?,
        atr_period: config
            .get_usize("risk", "atr_period")?
            .unwrap_or(defaults.atr_period),
        position_sizing,
        risk_per_trade_pct: config
            .get_f64("risk", "risk_per_trade_pct")?
            .unwrap_or(defaults.risk_per_trade_pct),
        fixed_notional: config
            .get_f64("risk", "fixed_notional")?
            .unwrap_or(defaults.fixed_notional),
        max_daily_drawdown_pct: config
            .get_f64("risk", "max_daily_drawdown_pct")?
            .unwrap_or(defaults.max_daily_drawdown_pct),
        fee_round_trip_pct: config
            .get_f64("backtest", "fee_round_trip_pct")?
            .unwrap_or(defaults.fee_round_trip_pct),
        slippage_pct: config
            .get_f64("backtest", "slippage_pct")?
            .unwrap_or(defaults.slippage_pct),
        fill_timing,
        intrabar_policy,
        max_bars: config.get_usize("backtest", "max_bars")?,
    };
    risk.validate()?;
    Ok(risk)
}

/// Config to result, without touching the report files.
pub fn execute_backtest(
    config: &dyn ConfigPort,
    data: &dyn DataPort,
) -> Result<BacktestResult, BacktestError> {
    let risk = build_risk_config(config)?;
    let strategy = build_strategy(config)?;
    let candles = data.fetch_candles()?;
    backtest_engine::run(candles, strategy.as_ref(), &risk)
}

/// Console summary, one line per metric.
pub fn summary_lines(result: &BacktestResult) -> Vec<String> {
    let stats = &result.stats;
    let ratio = match stats.return_drawdown.value() {
        Some(r) => format!("{r:.2}"),
        None => "n/a (no drawdown)".to_string(),
    };
    let profit_factor = if stats.profit_factor.is_infinite() {
        "inf".to_string()
    } else {
        format!("{:.2}", stats.profit_factor)
    };
    vec![
        format!("Trades:           {}", stats.trade_count),
        format!(
            "Wins / Losses:    {} / {} ({} breakeven)",
            stats.wins, stats.losses, stats.breakeven
        ),
        format!("Win Rate:         {:.2}%", stats.win_rate * 100.0),
        format!("Total Return:     {:.2}%", stats.total_return * 100.0),
        format!("Max Drawdown:     {:.2}%", stats.max_drawdown * 100.0),
        format!("Return/Drawdown:  {ratio}"),
        format!("Profit Factor:    {profit_factor}"),
        format!("Total Fees:       {:.2}", stats.total_fees),
        format!("Starting Balance: {:.2}", result.starting_balance),
        format!("Final Balance:    {:.2}", result.final_balance),
    ]
}

fn run_backtest(config_path: &Path, data_override: Option<&Path>, output: Option<&Path>) -> ExitCode {
    // Stage 1: load config
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    // Stage 2: validate before reading any candles
    if let Err(e) = validate_config(&config) {
        return fail(e);
    }

    // Stage 3: locate inputs and outputs
    let data_path = match resolve_data_path(&config, config_path, data_override) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let trades_path = resolve_trades_path(&config, config_path, output);
    let reporter = match config.get_string("report", "equity_path") {
        Some(p) if !p.trim().is_empty() => {
            CsvReportAdapter::with_equity_curve(resolve_relative(config_path, p.trim()))
        }
        _ => CsvReportAdapter::new(),
    };

    // Stage 4: run
    eprintln!("Loading candles from {}", data_path.display());
    let data = CsvAdapter::new(data_path);
    let result = match execute_backtest(&config, &data) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    // Stage 5: report
    eprintln!();
    eprintln!("=== Backtest Results ===");
    for line in summary_lines(&result) {
        eprintln!("{line}");
    }
    eprintln!();

    if let Err(e) = reporter.write(&result, &trades_path) {
        return fail(e);
    }
    eprintln!("Trade ledger written to {}", trades_path.display());

    ExitCode::SUCCESS
}

fn run_dry_run(config_path: &Path, data_override: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let plan = (|| -> Result<(), BacktestError> {
        let risk = build_risk_config(&config)?;
        let strategy = build_strategy(&config)?;
        let indicators = backtest_engine::required_indicators(strategy.as_ref(), &risk);
        let warmup = warmup_required(&indicators);

        eprintln!("Strategy:         {}", strategy.name());
        let names: Vec<String> = indicators.iter().map(|i| i.to_string()).collect();
        eprintln!("Indicators:       {}", names.join(", "));
        eprintln!("Warm-up bars:     {warmup}");
        eprintln!("Fill timing:      {:?}", risk.fill_timing);
        eprintln!("Intrabar policy:  {:?}", risk.intrabar_policy);

        let data_path = resolve_data_path(&config, config_path, data_override)?;
        let candles = CsvAdapter::new(data_path.clone()).fetch_candles()?;
        validate_candles(&candles)?;
        check_warmup(candles.len(), &indicators)?;
        eprintln!("Candles:          {} from {}", candles.len(), data_path.display());
        Ok(())
    })();

    match plan {
        Ok(()) => {
            eprintln!("Dry run complete: configuration valid");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let checked = validate_config(&config).and_then(|()| build_risk_config(&config));
    match checked {
        Ok(_) => {
            eprintln!("{}: valid", config_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_info(data_path: &Path) -> ExitCode {
    let candles = match CsvAdapter::new(data_path.to_path_buf()).fetch_candles() {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    eprintln!("File:   {}", data_path.display());
    eprintln!("Bars:   {}", candles.len());
    if let (Some(first), Some(last)) = (candles.first(), candles.last()) {
        eprintln!("First:  {}", first.timestamp);
        eprintln!("Last:   {}", last.timestamp);
        let low = candles.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let high = candles.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        eprintln!("Range:  {low} .. {high}");
    }

    match validate_candles(&candles) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::Stats;

    const MINIMAL: &str = "[backtest]\nstarting_balance = 5000\n\n[strategy]\nkind = ema_crossover\n";

    #[test]
    fn minimal_config_uses_defaults() {
        let config = FileConfigAdapter::from_string(MINIMAL).unwrap();
        let risk = build_risk_config(&config).unwrap();
        assert_eq!(
            risk,
            RiskConfig {
                starting_balance: 5000.0,
                ..RiskConfig::default()
            }
        );
    }

    #[test]
    fn level_rules_from_pct_and_atr_keys() {
        let ini = format!(
            "{MINIMAL}\n[risk]\nstop_loss_atr_mult = 1.5\ntake_profit_pct = 4\natr_period = 10\n"
        );
        let config = FileConfigAdapter::from_string(&ini).unwrap();
        let risk = build_risk_config(&config).unwrap();
        assert_eq!(risk.stop_loss, LevelRule::AtrMultiple(1.5));
        assert_eq!(risk.take_profit, LevelRule::Percent(4.0));
        assert_eq!(risk.atr_period, 10);
    }

    #[test]
    fn data_path_resolution() {
        let config = FileConfigAdapter::from_string("[data]\npath = candles.csv\n").unwrap();
        let cfg_path = Path::new("/tmp/runs/backtest.ini");
        assert_eq!(
            resolve_data_path(&config, cfg_path, None).unwrap(),
            PathBuf::from("/tmp/runs/candles.csv")
        );
        assert_eq!(
            resolve_data_path(&config, cfg_path, Some(Path::new("other.csv"))).unwrap(),
            PathBuf::from("other.csv")
        );

        let empty = FileConfigAdapter::from_string("[backtest]\nstarting_balance = 1\n").unwrap();
        assert!(matches!(
            resolve_data_path(&empty, cfg_path, None),
            Err(BacktestError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn trades_path_falls_back_to_default() {
        let config = FileConfigAdapter::from_string(MINIMAL).unwrap();
        assert_eq!(
            resolve_trades_path(&config, Path::new("cfg.ini"), None),
            PathBuf::from(DEFAULT_TRADES_PATH)
        );
    }

    #[test]
    fn summary_reports_missing_drawdown() {
        let result = BacktestResult {
            trades: Vec::new(),
            starting_balance: 1000.0,
            final_balance: 1000.0,
            equity_curve: Vec::new(),
            stats: Stats::empty(),
        };
        let lines = summary_lines(&result);
        assert!(lines.iter().any(|l| l.contains("n/a (no drawdown)")));
        assert!(lines.iter().any(|l| l == "Final Balance:    1000.00"));
    }
}
