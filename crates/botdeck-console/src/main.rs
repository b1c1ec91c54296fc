//! botdeck - operator console for the trading bot.

use anyhow::{bail, Context, Result};
use botdeck_cache::EntrySnapshot;
use botdeck_confirm::{DismissReason, LogNotifier};
use botdeck_core::{BotMode, CacheKey, Resource, RiskField, RiskLimitsPatch, Side};
use botdeck_gateway::{ApiKey, Command, ManualOrder};
use botdeck_console::{AppConfig, Console, PreferenceStore, Theme};
use botdeck_telemetry::Metrics;
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Operator console for the trading bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via BOTDECK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Follow bot status, positions and orders as the push stream updates them
    Watch,
    /// Print the bot status
    Status,
    /// Print open positions
    Positions,
    /// Print orders
    Orders,
    /// Print current risk limits
    Risk,
    Pause {
        #[arg(long)]
        reason: String,
    },
    Resume,
    /// Activate the kill switch
    Kill {
        #[arg(long)]
        reason: String,
        /// Skip the yes/no prompt (a required typed phrase is still asked)
        #[arg(long)]
        yes: bool,
    },
    CancelAll {
        #[arg(long)]
        yes: bool,
    },
    /// Close every open position
    Flatten {
        #[arg(long, default_value = "Manual flatten from console")]
        reason: String,
        #[arg(long)]
        yes: bool,
    },
    /// Submit a manual order
    Order {
        #[arg(long)]
        token_id: String,
        #[arg(long, value_enum)]
        side: SideArg,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        size: f64,
        #[arg(long)]
        condition_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    ClosePosition {
        position_id: String,
        /// Limit price; market when omitted
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        yes: bool,
    },
    Block {
        condition_id: String,
        #[arg(long)]
        reason: String,
    },
    Unblock {
        condition_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Update risk limits, e.g. `--set stopLoss=0.25 --set max_positions=8`
    SetRisk {
        #[arg(long = "set", value_parser = parse_assignment, required = true)]
        set: Vec<(RiskField, f64)>,
    },
    /// Store the API key
    Login { key: String },
    /// Remove the stored API key
    Logout,
    Theme {
        #[arg(value_enum)]
        theme: ThemeArg,
    },
    /// Print Prometheus metrics collected by this process
    Metrics,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Buy => Side::Buy,
            SideArg::Sell => Side::Sell,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
    System,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::System => Theme::System,
        }
    }
}

fn parse_assignment(s: &str) -> std::result::Result<(RiskField, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got {s:?}"))?;
    let field: RiskField = name.trim().parse().map_err(|e| format!("{e}"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("{}: must be a number", field.as_str()))?;
    Ok((field, value))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any wss:// connection
    botdeck_stream::init_crypto();

    let args = Args::parse();
    botdeck_telemetry::init_logging()?;

    info!("Starting botdeck v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > BOTDECK_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("BOTDECK_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());
    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::from_file(&config_path)?;

    let prefs = PreferenceStore::new(config.preferences.path.clone());
    match &args.command {
        Cmd::Login { key } => {
            prefs.set_api_key(key)?;
            println!("API key saved to {}", prefs.path().display());
            return Ok(());
        }
        Cmd::Logout => {
            prefs.clear_api_key()?;
            println!("API key removed");
            return Ok(());
        }
        Cmd::Theme { theme } => {
            let theme = Theme::from(*theme);
            prefs.set_theme(theme)?;
            println!("Theme set to {theme}");
            return Ok(());
        }
        Cmd::Metrics => {
            print!("{}", Metrics::render()?);
            return Ok(());
        }
        _ => {}
    }

    let api_key = prefs.load()?.api_key();
    let console = Console::new(config, api_key.clone(), Arc::new(LogNotifier))?;

    match args.command {
        Cmd::Watch => watch(&console, api_key.as_ref()).await?,
        Cmd::Status => print_json(&console.bot_status().await?)?,
        Cmd::Positions => print_json(&console.positions().await?)?,
        Cmd::Orders => print_json(&console.orders().await?)?,
        Cmd::Risk => print_json(&console.risk_limits().await?)?,
        Cmd::Pause { reason } => run(&console, Command::Pause { reason }).await?,
        Cmd::Resume => run(&console, Command::Resume).await?,
        Cmd::Block {
            condition_id,
            reason,
        } => {
            run(
                &console,
                Command::BlockMarket {
                    condition_id,
                    reason,
                },
            )
            .await?
        }
        Cmd::Unblock {
            condition_id,
            reason,
        } => {
            run(
                &console,
                Command::UnblockMarket {
                    condition_id,
                    reason,
                },
            )
            .await?
        }
        Cmd::Order {
            token_id,
            side,
            price,
            size,
            condition_id,
            reason,
        } => {
            let order = ManualOrder {
                token_id,
                side: side.into(),
                price,
                size,
                condition_id,
                reason,
            };
            run(&console, Command::ManualOrder(order)).await?
        }
        Cmd::SetRisk { set } => {
            let patch = set
                .into_iter()
                .fold(RiskLimitsPatch::default(), |patch, (field, value)| {
                    patch.with(field, value)
                });
            print_json(&console.update_risk_limits(patch).await?)?
        }
        Cmd::Kill { reason, yes } => {
            let id = console.request_kill(reason).await?;
            confirm(&console, id, yes).await?
        }
        Cmd::CancelAll { yes } => {
            let id = console.request_cancel_all().await?;
            confirm(&console, id, yes).await?
        }
        Cmd::Flatten { reason, yes } => {
            let id = console.request_flatten(reason).await?;
            confirm(&console, id, yes).await?
        }
        Cmd::ClosePosition {
            position_id,
            price,
            reason,
            yes,
        } => {
            let id = console
                .request_close_position(&position_id, price, reason)
                .await?;
            confirm(&console, id, yes).await?
        }
        Cmd::Login { .. } | Cmd::Logout | Cmd::Theme { .. } | Cmd::Metrics => {}
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(console: &Console, command: Command) -> Result<()> {
    let value = console.run_command(&command).await?;
    print_json(&value)
}

async fn prompt(question: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read confirmation")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Walk the operator through the pending dialog, then confirm or dismiss.
async fn confirm(console: &Console, id: Uuid, yes: bool) -> Result<()> {
    let workflow = console.workflow();
    let Some(view) = workflow.view().filter(|v| v.id == id) else {
        bail!("confirmation dialog is no longer active");
    };

    println!("{} ({:?})", view.title, view.severity);
    if !view.description.is_empty() {
        println!("{}", view.description);
    }
    for consequence in &view.consequences {
        println!("  - {consequence}");
    }

    if let Some(phrase) = &view.required_phrase {
        let input = prompt(&format!("Type {phrase} to confirm: ")).await?;
        workflow.set_input(input)?;
    } else if !yes {
        let answer = prompt(&format!("{}? [y/N] ", view.confirm_label)).await?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            workflow.dismiss(DismissReason::Cancel);
            println!("Cancelled");
            return Ok(());
        }
    }

    if !workflow.can_confirm() {
        workflow.dismiss(DismissReason::Cancel);
        println!("Confirmation phrase did not match, cancelled");
        return Ok(());
    }

    let value = workflow.confirm().await?;
    print_json(&value)
}

/// One watch line: the retained value together with the last refresh
/// error, if any.
fn snapshot_line(label: &str, snapshot: &EntrySnapshot) -> Option<String> {
    match (&snapshot.value, &snapshot.error) {
        (Some(value), Some(error)) => {
            Some(format!("[{label}] {value} (stale, refresh failed: {error})"))
        }
        (Some(value), None) => Some(format!("[{label}] {value}")),
        (None, Some(error)) => Some(format!("[{label}] error: {error}")),
        (None, None) => None,
    }
}

fn print_snapshot(label: &str, snapshot: &EntrySnapshot) {
    if let Some(line) = snapshot_line(label, snapshot) {
        println!("{line}");
    }
}

async fn watch(console: &Console, api_key: Option<&ApiKey>) -> Result<()> {
    let token = CancellationToken::new();
    let maintenance = console.spawn_maintenance(token.clone());
    let mut stream = console.open_stream(api_key)?;

    let mut status = console.observe(&CacheKey::family(Resource::BotStatus));
    let mut positions = console.observe(&CacheKey::family(Resource::Positions));
    let mut orders = console.observe(&CacheKey::family(Resource::Orders));

    loop {
        tokio::select! {
            Some(snapshot) = status.changed() => {
                if let Some(mode) = snapshot.value.as_ref().and_then(|v| v.get("mode")) {
                    if let Ok(mode) = serde_json::from_value::<BotMode>(mode.clone()) {
                        console.workflow().set_mode(mode);
                    }
                }
                print_snapshot("status", &snapshot);
            }
            Some(snapshot) = positions.changed() => print_snapshot("positions", &snapshot),
            Some(snapshot) = orders.changed() => print_snapshot("orders", &snapshot),
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    token.cancel();
    stream.close().await?;
    if let Some(task) = maintenance {
        if let Err(e) = task.await {
            warn!(error = %e, "Cache maintenance task failed");
        }
    }
    Ok(())
}
