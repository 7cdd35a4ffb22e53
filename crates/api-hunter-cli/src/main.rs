//! API Hunter: entry point.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use api_hunter::{CancelFlag, SourceKind};
use api_hunter_cli::auth::AuthOptions;
use api_hunter_cli::config::Overrides;
use api_hunter_cli::report::ReportFormat;
use api_hunter_cli::scan::{self, ScanRequest};

#[derive(Parser)]
#[command(
    name = "api-hunter",
    about = "API Hunter: discover likely API endpoints of a web application",
    version,
    after_help = "Only scan targets you are authorized to test."
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Shorthand for --log-level debug.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a target URL for API endpoints.
    Scan(ScanArgs),

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   api-hunter completions bash > ~/.local/share/bash-completion/completions/api-hunter
    ///   api-hunter completions zsh > ~/.zfunc/_api-hunter
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Target URL (scheme defaults to https).
    url: String,

    /// Write the report to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the report under a generated file name.
    #[arg(long)]
    auto_save: bool,

    /// Report format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Console)]
    format: ReportFormat,

    /// Drop endpoints scoring below this confidence (0.0 to 1.0).
    #[arg(long)]
    threshold: Option<f64>,

    /// Keep endpoints outside the target's registrable domain.
    #[arg(long)]
    extend_scope: bool,

    /// Comma-separated source kinds to keep (e.g. javascript,swagger,common_path).
    #[arg(long, value_delimiter = ',')]
    extractors: Option<Vec<SourceKind>>,

    /// Maximum concurrent requests.
    #[arg(long)]
    workers: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip common-path probing.
    #[arg(long)]
    no_probe: bool,

    /// HEAD every discovered endpoint and report reachability.
    #[arg(long)]
    validate: bool,

    /// Maximum number of linked scripts to fetch.
    #[arg(long)]
    max_scripts: Option<usize>,

    /// Extra request headers as a JSON object.
    #[arg(long)]
    auth_headers: Option<String>,

    /// Cookies as a JSON object.
    #[arg(long)]
    cookies: Option<String>,

    /// Bearer token for the Authorization header.
    #[arg(long)]
    bearer: Option<String>,

    /// Config file (TOML). Also reads API_HUNTER_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl From<ScanArgs> for ScanRequest {
    fn from(args: ScanArgs) -> Self {
        ScanRequest {
            target: args.url,
            format: args.format,
            output: args.output,
            auto_save: args.auto_save,
            config: args.config,
            overrides: Overrides {
                threshold: args.threshold,
                extend_scope: args.extend_scope,
                extractors: args.extractors,
                workers: args.workers,
                timeout_secs: args.timeout,
                max_scripts: args.max_scripts,
                no_probe: args.no_probe,
                validate: args.validate,
            },
            auth: AuthOptions {
                headers_json: args.auth_headers,
                cookies_json: args.cookies,
                bearer: args.bearer,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Scan(args) => {
            let cancel = CancelFlag::default();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, cancelling scan");
                    on_signal.store(true, Ordering::Relaxed);
                }
            });

            scan::run(args.into(), cancel).await.map(|outcome| {
                tracing::info!(
                    endpoints = outcome.endpoints.len(),
                    dropped = outcome.stats.dropped,
                    malformed = outcome.stats.malformed,
                    "scan finished"
                );
            })
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "api-hunter", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
