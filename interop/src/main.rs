//! HTTP/2 framing conformance probe.
//!
//! # Usage
//!
//! Run every scenario against a TLS server:
//! ```bash
//! h2interop --server-host localhost --server-port 8443
//! ```
//!
//! Run one suite against a plaintext (prior-knowledge h2c) server:
//! ```bash
//! h2interop --server-host 127.0.0.1 --server-port 8080 --use-tls false --test-case framing
//! ```
//!
//! List scenarios:
//! ```bash
//! h2interop --list
//! ```
//!
//! # Exit Codes
//!
//! - 0: every scenario that ran passed
//! - 1: at least one scenario failed
//! - 2: the probe could not run

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use h2interop::report::Report;
use h2interop::{InteropCtx, scenarios};
use serde::Serialize;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "h2interop")]
#[command(about = "HTTP/2 framing conformance probe")]
struct Args {
    /// Server to probe
    #[arg(long, default_value = "localhost")]
    server_host: String,

    #[arg(long, default_value_t = 8080)]
    server_port: u16,

    /// Connect over TLS with ALPN h2; `false` speaks prior-knowledge h2c
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    use_tls: bool,

    /// Name sent in SNI instead of --server-host
    #[arg(long)]
    server_host_override: Option<String>,

    /// Suite (framing, tls) or full scenario name; `all` runs everything
    #[arg(long)]
    test_case: Option<String>,

    /// How long a scenario waits for each expected reaction
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Scenarios run at the same time
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// List available scenarios
    #[arg(long)]
    list: bool,

    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// JSON output for a scenario listing.
#[derive(Serialize)]
struct ScenarioJson {
    name: &'static str,
    suite: &'static str,
    description: &'static str,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.list {
        list_scenarios(&args);
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            return ExitCode::from(2);
        }
    };
    ExitCode::from(runtime.block_on(run(args)))
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn list_scenarios(args: &Args) {
    let tests = match args.test_case.as_deref() {
        None | Some("all") => scenarios::list_all(),
        Some(filter) => scenarios::list_all()
            .into_iter()
            .filter(|t| scenarios::selects(t, Some(filter)))
            .collect(),
    };

    if args.format == Format::Json {
        let output: Vec<_> = tests
            .iter()
            .map(|t| ScenarioJson {
                name: t.name,
                suite: t.suite,
                description: t.description,
            })
            .collect();
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => error!(error = %e, "failed to render listing"),
        }
        return;
    }

    println!("Available scenarios:\n");
    let mut current_suite = "";
    for test in &tests {
        if test.suite != current_suite {
            if !current_suite.is_empty() {
                println!();
            }
            println!("## {}", test.suite);
            current_suite = test.suite;
        }
        println!("  {:<34} {}", test.name, test.description);
    }
    println!("\nTotal: {} scenarios", tests.len());
}

async fn run(args: Args) -> u8 {
    let ctx = InteropCtx {
        server_host: args.server_host,
        server_port: args.server_port,
        use_tls: args.use_tls,
        server_host_override: args.server_host_override,
        timeout: Duration::from_millis(args.timeout_ms),
    };

    if let Some(filter) = args.test_case.as_deref()
        && !scenarios::list_all()
            .iter()
            .any(|t| scenarios::selects(t, Some(filter)))
    {
        error!(test_case = filter, "no scenario matches");
        return 2;
    }

    match ctx.resolve().await {
        Ok(addr) => debug!(%addr, "target resolved"),
        Err(e) => {
            error!(server = %ctx.authority(), error = %e, "cannot resolve server");
            return 2;
        }
    }

    let report = Arc::new(Report::new());
    scenarios::run_all(
        Arc::new(ctx),
        Arc::clone(&report),
        args.test_case.as_deref(),
        args.jobs,
    )
    .await;

    match args.format {
        Format::Text => print!("{}", report.render_text(std::io::stdout().is_terminal())),
        Format::Json => match report.render_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!(error = %e, "failed to render report");
                return 2;
            }
        },
    }
    report.exit_code()
}
