use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use azqr::arm::Credential;
use azqr::config::{Config, DEFAULT_CONFIG_FILE};
use azqr::error::AzqrError;
use azqr::output::{self, OutputFormat};
use azqr::scanners::ScannerKind;
use azqr::ScanOptions;

#[derive(Parser)]
#[command(
    name = "azqr",
    about = "Audit Azure resources against best-practice rules",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan resource groups of a subscription
    Scan {
        /// Subscription to scan
        #[arg(long, short = 's', env = "AZURE_SUBSCRIPTION_ID")]
        subscription_id: String,

        /// Resource group to scan (repeatable)
        #[arg(long = "resource-group", short = 'g', required = true)]
        resource_groups: Vec<String>,

        /// Resource kind to scan: kv, sigr, cosmos, st, ci (repeatable; default all)
        #[arg(long = "kind", short = 'k')]
        kinds: Vec<String>,

        /// Config file path
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output format (console, json)
        #[arg(long, short = 'f', default_value = "console")]
        format: String,

        /// Write output to file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Maximum concurrent scanner jobs
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// List the rules evaluated for each resource kind
    ListRules {
        /// Output format (table, json)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Generate a starter .azqr.toml config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// `RUST_LOG` wins, then `AZQR_LOGLEVEL`, then `azqr=info`. Logs go to stderr
/// so stdout stays clean for the report.
fn init_logging() {
    let level = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("AZQR_LOGLEVEL"))
        .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")));

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Commands::Scan {
            subscription_id,
            resource_groups,
            kinds,
            config,
            format,
            output,
            concurrency,
        } => {
            cmd_scan(
                subscription_id,
                resource_groups,
                kinds,
                config,
                format,
                output,
                concurrency,
            )
            .await
        }
        Commands::ListRules { format } => cmd_list_rules(format),
        Commands::Init { force } => cmd_init(force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn parse_kinds(raw: &[String]) -> Result<Vec<ScannerKind>, AzqrError> {
    raw.iter()
        .map(|s| {
            ScannerKind::from_str_lenient(s)
                .ok_or_else(|| AzqrError::Config(format!("unknown resource kind '{s}'")))
        })
        .collect()
}

async fn cmd_scan(
    subscription_id: String,
    resource_groups: Vec<String>,
    kinds: Vec<String>,
    config: Option<PathBuf>,
    format_str: String,
    output_path: Option<PathBuf>,
    concurrency: Option<usize>,
) -> Result<i32, AzqrError> {
    let format = OutputFormat::from_str_lenient(&format_str).unwrap_or_else(|| {
        eprintln!("Warning: unknown format '{}', using console", format_str);
        OutputFormat::Console
    });

    let mut options = ScanOptions::new(subscription_id);
    options.config_path = config;
    options.credential = Some(Credential::from_env()?);
    options.resource_groups = resource_groups;
    options.kinds = parse_kinds(&kinds)?;
    options.concurrency_override = concurrency;

    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling scan");
            cancel.cancel();
        }
    });

    let report = azqr::scan(&options).await?;
    let rendered = azqr::render_report(&report, format)?;

    match output_path {
        Some(out) => std::fs::write(&out, &rendered)?,
        None => print!("{}", rendered),
    }

    // Exit code: 0 = pass, 1 = policy verdict failed
    Ok(if report.verdict.pass { 0 } else { 1 })
}

fn cmd_list_rules(format_str: String) -> Result<i32, AzqrError> {
    let format = match format_str.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Console,
    };

    let catalog = ScannerKind::ALL
        .into_iter()
        .map(|kind| -> Result<_, AzqrError> { Ok((kind, kind.rule_metadata()?)) })
        .collect::<Result<Vec<_>, AzqrError>>()?;
    println!("{}", output::render_rules(&catalog, format)?);

    Ok(0)
}

fn cmd_init(force: bool) -> Result<i32, AzqrError> {
    let path = PathBuf::from(DEFAULT_CONFIG_FILE);

    if path.exists() && !force {
        eprintln!("{DEFAULT_CONFIG_FILE} already exists. Use --force to overwrite.");
        return Ok(1);
    }

    std::fs::write(&path, Config::starter_toml())?;
    println!("Created {DEFAULT_CONFIG_FILE}");

    Ok(0)
}
