//! signalwatch CLI: market signal monitor with rate-limited alerts.
//!
//! Commands:
//! - `run`: start the monitor loops (fast, slow, report, heartbeat, ...)
//! - `scan`: score every symbol once on one timeframe and print the ranking
//! - `report`: build the top-N report once; print it or send it
//! - `score`: score a single symbol and show every component
//! - `test-alert`: send a test message through the configured notifier
//! - `config`: print the effective configuration and its fingerprint

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use signalwatch_core::alerts::format_test_message;
use signalwatch_core::data::{BybitProvider, CircuitBreaker, StaticSymbols, SymbolSource};
use signalwatch_core::domain::{closes, volumes, Timeframe};
use signalwatch_core::notify::{LogNotifier, Notifier, NotifyError, TelegramNotifier};
use signalwatch_core::report::last_change_pct;
use signalwatch_core::score::ScoreInput;
use signalwatch_core::MonitorConfig;
use signalwatch_runner::{stop_on_signal, Monitor};

#[derive(Parser)]
#[command(
    name = "signalwatch",
    version,
    about = "signalwatch: multi-timeframe market signal monitor"
)]
struct Cli {
    /// TOML config file. Environment variables override it.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the monitor loops until interrupted.
    Run {
        /// Log alerts instead of sending them.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Stop after this many fast cycles.
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Score every symbol once and print the full ranking.
    Scan {
        /// Timeframe to scan. Defaults to the report timeframe.
        #[arg(long)]
        timeframe: Option<Timeframe>,

        /// Rows to print.
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Build the ranked report once.
    Report {
        /// Send through the configured notifier instead of printing.
        #[arg(long, default_value_t = false)]
        send: bool,
    },
    /// Score one symbol and show every component.
    Score {
        symbol: String,

        #[arg(long, default_value = "1h")]
        timeframe: Timeframe,

        /// Candles to fetch. Defaults to the report candle limit.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Send a test message through the configured notifier.
    TestAlert,
    /// Print the effective configuration (token redacted).
    Config {
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Prints messages to stdout for one-shot commands.
struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn name(&self) -> &str {
        "stdout"
    }

    fn notify(&self, text: &str) -> Result<(), NotifyError> {
        println!("{text}");
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { dry_run, cycles } => run_monitor(config, dry_run, cycles),
        Commands::Scan { timeframe, top } => run_scan(config, timeframe, top),
        Commands::Report { send } => run_report(config, send),
        Commands::Score {
            symbol,
            timeframe,
            limit,
            format,
        } => run_score(&config, &symbol, timeframe, limit, format),
        Commands::TestAlert => run_test_alert(&config),
        Commands::Config { format } => print_config(&config, format),
    }
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    let config = MonitorConfig::load(path).context("invalid configuration")?;
    tracing::debug!(fingerprint = %config.fingerprint(), "configuration loaded");
    Ok(config)
}

// ── Collaborators ───────────────────────────────────────────────────

fn bybit(config: &MonitorConfig) -> Result<Arc<BybitProvider>> {
    let breaker = Arc::new(CircuitBreaker::default_exchange());
    let provider = BybitProvider::new(&config.bybit_base_url, breaker)
        .context("failed to build Bybit client")?;
    Ok(Arc::new(provider))
}

fn symbol_source(config: &MonitorConfig, provider: &Arc<BybitProvider>) -> Arc<dyn SymbolSource> {
    if config.symbols.is_empty() {
        let discovered: Arc<dyn SymbolSource> = provider.clone();
        discovered
    } else {
        Arc::new(StaticSymbols::new(config.symbols.clone()))
    }
}

/// Telegram when configured, otherwise the log sink.
fn notifier(config: &MonitorConfig, dry_run: bool) -> Result<Arc<dyn Notifier>> {
    if dry_run {
        return Ok(Arc::new(LogNotifier));
    }
    match &config.telegram_bot_token {
        Some(token) if config.telegram_configured() => {
            let telegram = TelegramNotifier::new(token, config.telegram_chat_ids.clone())
                .context("failed to build Telegram notifier")?;
            Ok(Arc::new(telegram))
        }
        _ => {
            tracing::warn!("Telegram not configured, alerts go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

fn build_monitor(config: MonitorConfig, notifier: Arc<dyn Notifier>) -> Result<Monitor> {
    let provider = bybit(&config)?;
    let symbols = symbol_source(&config, &provider);
    Ok(Monitor::new(config, provider, symbols, notifier)?)
}

// ── Commands ────────────────────────────────────────────────────────

fn run_monitor(config: MonitorConfig, dry_run: bool, cycles: Option<u64>) -> Result<()> {
    let notifier = notifier(&config, dry_run)?;
    let monitor = build_monitor(config, notifier)?;
    let shutdown = Arc::new(AtomicBool::new(false));
    stop_on_signal(Arc::clone(&shutdown)).context("failed to install signal handler")?;
    let stats = monitor.run(shutdown, cycles)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn run_scan(config: MonitorConfig, timeframe: Option<Timeframe>, top: usize) -> Result<()> {
    let timeframe = timeframe.unwrap_or(config.report_timeframe);
    let monitor = build_monitor(config, Arc::new(StdoutNotifier))?;
    if !monitor.refresh_universe(Utc::now()) {
        bail!("could not load the symbol universe");
    }

    let report = monitor.scan(timeframe, Utc::now());
    println!(
        "{:<4} {:<16} {:>5} {:>9} {:>16} {:>7} {:>9}  tier",
        "#", "symbol", "score", "move%", "price", "rsi", "vol×"
    );
    for (i, e) in report.entries.iter().take(top).enumerate() {
        let rsi = e.rsi.map(|r| format!("{r:.1}")).unwrap_or_else(|| "-".into());
        println!(
            "{:<4} {:<16} {:>5} {:>+9.2} {:>16.6} {:>7} {:>9.1}  {}{}",
            i + 1,
            e.symbol,
            e.score,
            e.variation_pct,
            e.price,
            rsi,
            e.volume_ratio,
            e.tier_label(),
            if e.compressing { " (compressing)" } else { "" }
        );
    }
    println!(
        "{} of {} symbols scored on {timeframe}",
        report.entries.len(),
        monitor.universe().len()
    );
    Ok(())
}

fn run_report(config: MonitorConfig, send: bool) -> Result<()> {
    let notifier: Arc<dyn Notifier> = if send {
        notifier(&config, false)?
    } else {
        Arc::new(StdoutNotifier)
    };
    let monitor = build_monitor(config, notifier)?;
    if !monitor.refresh_universe(Utc::now()) {
        bail!("could not load the symbol universe");
    }
    monitor.report_cycle(Utc::now());
    if send && monitor.stats().reports_sent == 0 {
        bail!("report could not be delivered");
    }
    Ok(())
}

fn run_score(
    config: &MonitorConfig,
    symbol: &str,
    timeframe: Timeframe,
    limit: Option<usize>,
    format: Format,
) -> Result<()> {
    use signalwatch_core::data::MarketData;

    let symbol = symbol.trim().to_uppercase();
    let provider = bybit(config)?;
    let candles = provider
        .fetch_candles(&symbol, timeframe, limit.unwrap_or(config.report_candle_limit))
        .with_context(|| format!("fetching {symbol}@{timeframe}"))?;

    let c = closes(&candles);
    let v = volumes(&candles);
    let variation_pct = last_change_pct(&c);
    let result = config.score_engine().score(ScoreInput {
        closes: &c,
        volumes: &v,
        variation_pct,
        timeframe,
    });

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => {
            let fmt = |x: Option<f64>| x.map(|x| format!("{x:.4}")).unwrap_or_else(|| "n/a".into());
            let comp = &result.components;
            println!("{symbol}@{timeframe}: {}/100 (raw {:+.2})", result.normalized_score, result.raw);
            println!("  candles     {}", candles.len());
            println!("  move        {variation_pct:+.2}%");
            println!("  ema         {} / {}", fmt(comp.ema_fast), fmt(comp.ema_slow));
            println!("  macd        {} / {}", fmt(comp.macd), fmt(comp.macd_signal));
            println!("  rsi         {}", fmt(comp.rsi));
            println!("  volatility  {:.5} ({})", comp.volatility, result.profile.tier);
            println!("  volume      {:.2}×", comp.volume_ratio);
            for reason in &result.reasons {
                println!("  ▪ {reason}");
            }
        }
    }
    Ok(())
}

fn run_test_alert(config: &MonitorConfig) -> Result<()> {
    let notifier = notifier(config, false)?;
    notifier
        .notify(&format_test_message(Utc::now()))
        .with_context(|| format!("test message via {} failed", notifier.name()))?;
    println!("test message sent via {}", notifier.name());
    Ok(())
}

fn print_config(config: &MonitorConfig, format: Format) -> Result<()> {
    let shown = config.redacted();
    match format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&shown)?);
            eprintln!("fingerprint: {}", config.fingerprint());
        }
        Format::Text => {
            print!("{}", toml::to_string_pretty(&shown)?);
            println!("# fingerprint: {}", config.fingerprint());
        }
    }
    Ok(())
}
