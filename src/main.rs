//! Indicator Reputation CLI.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use zentinel_indicator_reputation::{Config, IndicatorKind, Provider, ReputationAnalyzer};

#[derive(Parser, Debug)]
#[command(name = "zentinel-indicator-reputation")]
#[command(about = "Indicator reputation for Zentinel - score IPs, file hashes and domains against threat intelligence sources")]
#[command(version)]
struct Args {
    /// Indicator kind (ip, hash, domain)
    #[arg(required_unless_present_any = ["print_config", "validate"])]
    kind: Option<IndicatorKind>,

    /// Indicator value
    #[arg(required_unless_present_any = ["print_config", "validate"])]
    value: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// vpnapi.io API key (overrides configuration)
    #[arg(long, env = "VPNAPI_KEY", hide_env_values = true)]
    vpnapi_key: Option<String>,

    /// VirusTotal API key (overrides configuration)
    #[arg(long, env = "VIRUSTOTAL_KEY", hide_env_values = true)]
    virustotal_key: Option<String>,

    /// AbuseIPDB API key (overrides configuration)
    #[arg(long, env = "ABUSEIPDB_KEY", hide_env_values = true)]
    abuseipdb_key: Option<String>,

    /// Per-source deadline in milliseconds (overrides configuration)
    #[arg(long, value_name = "MS")]
    deadline_ms: Option<u64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "warn")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", Config::example());
        return Ok(ExitCode::SUCCESS);
    }

    // Logs go to stderr; stdout carries only the JSON result
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            Config::load(path)?
        }
        None => Config::default(),
    };

    if args.validate {
        info!("Configuration is valid");
        return Ok(ExitCode::SUCCESS);
    }

    let (Some(kind), Some(value)) = (args.kind, args.value.as_deref()) else {
        anyhow::bail!("an indicator kind and value are required");
    };

    let mut credentials = config.source_credentials();
    let overrides = [
        (Provider::VpnApi, &args.vpnapi_key),
        (Provider::VirusTotal, &args.virustotal_key),
        (Provider::AbuseIpdb, &args.abuseipdb_key),
    ];
    for (provider, key) in overrides {
        if let Some(key) = key {
            credentials.insert(provider, key.as_str());
        }
    }

    let deadline = args
        .deadline_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.deadline());
    if deadline.is_zero() {
        anyhow::bail!("--deadline-ms must be greater than 0");
    }

    let analyzer = ReputationAnalyzer::new(&config)?;

    match analyzer.analyze_within(kind, value, &credentials, deadline).await {
        Ok(report) => {
            print_json(&report, args.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(kind = %kind, status = e.status_code(), error = %e, "Analysis failed");
            print_json(&e.to_body(), args.pretty)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", json);
    Ok(())
}
