//! a2a-check - conformance probe for A2A v0.3 servers
//!
//! ## Commands
//!
//! - `net probe`: origin and card endpoint reachability
//! - `card fetch` / `card validate`: discovery, schema and card rules
//! - `rpc ping` / `rpc ping-from-card` / `rpc stream`: JSON-RPC checks
//! - `suite all`: every phase, both transports
//!
//! Findings go to stdout as tab-separated rows (or JSON with `--json`);
//! logs go to stderr. Exit code is 1 on any ERROR finding, 2 on WARN with
//! `--fail-on-warn`, otherwise 0.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use a2a_check::catalog::DEFAULT_WELL_KNOWN_PATH;
use a2a_check::{ProbeConfig, Report, Suite};

#[derive(Parser)]
#[command(name = "a2a-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Conformance checks for A2A v0.3 servers", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = 8.0)]
    timeout: f64,

    /// Event stream read window in seconds
    #[arg(long, global = true, default_value_t = 12.0)]
    stream_timeout: f64,

    /// Overall wall-clock budget in seconds
    #[arg(long, global = true, default_value_t = 120.0)]
    budget: f64,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Bearer token for authenticated probes
    #[arg(long, global = true, env = "A2A_CHECK_AUTH_BEARER", hide_env_values = true)]
    auth_bearer: Option<String>,

    /// Extra header sent on every request, as `Name:Value` (repeatable)
    #[arg(long = "header", global = true, value_name = "K:V")]
    headers: Vec<String>,

    /// Agent card path relative to the origin
    #[arg(long, global = true, default_value = DEFAULT_WELL_KNOWN_PATH)]
    well_known_path: String,

    /// Exit with code 2 when WARN findings are present
    #[arg(long, global = true)]
    fail_on_warn: bool,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Network reachability checks
    Net {
        #[command(subcommand)]
        action: NetAction,
    },

    /// Agent card checks
    Card {
        #[command(subcommand)]
        action: CardAction,
    },

    /// JSON-RPC transport checks
    Rpc {
        #[command(subcommand)]
        action: RpcAction,
    },

    /// Full conformance suite
    Suite {
        #[command(subcommand)]
        action: SuiteAction,
    },
}

#[derive(Subcommand)]
enum NetAction {
    /// Probe the origin and the card endpoint
    Probe {
        /// Agent base URL
        url: String,
    },
}

#[derive(Args)]
struct CardTarget {
    /// Agent base URL
    url: String,

    /// Explicit card URL (overrides the well-known path)
    #[arg(long)]
    card_url: Option<String>,
}

#[derive(Subcommand)]
enum CardAction {
    /// Fetch the card and run every card check
    Fetch(CardTarget),
    /// Alias of `fetch`
    Validate(CardTarget),
}

#[derive(Subcommand)]
enum RpcAction {
    /// Request/response checks against a JSON-RPC endpoint
    Ping {
        /// JSON-RPC endpoint URL
        url: String,
    },

    /// Discover the card, then ping its JSON-RPC interface
    PingFromCard(CardTarget),

    /// Open one message/stream and validate it
    Stream {
        /// JSON-RPC endpoint URL
        url: String,

        /// Message text to send
        #[arg(long, default_value = "stream test")]
        text: String,
    },
}

#[derive(Subcommand)]
enum SuiteAction {
    /// Run network, schema, card, jsonrpc and rest checks
    All(CardTarget),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn seconds(flag: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        bail!("--{flag} must be a positive number of seconds, got {value}");
    }
    Ok(Duration::from_secs_f64(value))
}

fn build_config(args: &GlobalArgs) -> Result<ProbeConfig> {
    let mut config = ProbeConfig::default()
        .with_timeout(seconds("timeout", args.timeout)?)
        .with_stream_timeout(seconds("stream-timeout", args.stream_timeout)?)
        .with_overall_budget(seconds("budget", args.budget)?)
        .with_insecure(args.insecure)
        .with_well_known_path(args.well_known_path.clone())
        .with_fail_on_warn(args.fail_on_warn);

    if let Some(token) = &args.auth_bearer {
        config = config.with_bearer_token(token.clone());
    }
    for raw in &args.headers {
        let (key, value) = raw
            .split_once(':')
            .with_context(|| format!("invalid --header '{raw}', expected K:V"))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid --header '{raw}', empty header name");
        }
        config = config.with_header(key, value.trim());
    }
    Ok(config)
}

async fn run(command: Commands, suite: &Suite) -> Report {
    match command {
        Commands::Net {
            action: NetAction::Probe { url },
        } => suite.net_probe(&url).await,
        Commands::Card {
            action: CardAction::Fetch(t),
        } => suite.card_fetch(&t.url, t.card_url.as_deref()).await,
        Commands::Card {
            action: CardAction::Validate(t),
        } => suite.card_validate(&t.url, t.card_url.as_deref()).await,
        Commands::Rpc {
            action: RpcAction::Ping { url },
        } => suite.rpc_ping(&url).await,
        Commands::Rpc {
            action: RpcAction::PingFromCard(t),
        } => suite.rpc_ping_from_card(&t.url, t.card_url.as_deref()).await,
        Commands::Rpc {
            action: RpcAction::Stream { url, text },
        } => suite.rpc_stream(&url, &text).await,
        Commands::Suite {
            action: SuiteAction::All(t),
        } => suite.suite_all(&t.url, t.card_url.as_deref()).await,
    }
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("failed to serialize report")?
        );
    } else {
        print!("{report}");
    }
    Ok(())
}

async fn try_main(cli: Cli) -> Result<i32> {
    let config = build_config(&cli.global)?;
    let fail_on_warn = config.fail_on_warn;
    let suite = Suite::structural(config).context("failed to set up the suite")?;

    let report = run(cli.command, &suite).await;
    print_report(&report, cli.global.json)?;
    Ok(report.exit_code(fail_on_warn))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match try_main(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
