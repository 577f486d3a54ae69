// # cloudns-sync - ClouDNS zone synchronization
//
// Thin command-line layer over `cloudns_core::SyncEngine`. Record logic,
// reconciliation and retries all live in cloudns-core; this binary only:
// 1. Reads configuration from environment variables
// 2. Initializes logging and the runtime
// 3. Wires the ClouDNS client into the engine
// 4. Maps subcommands onto get/append/set/delete (and propagation checks)
//
// ## Configuration
//
// Credentials and retry settings come from environment variables:
//
// ### Provider
// - `CLOUDNS_AUTH_ID`: Main account auth id
// - `CLOUDNS_SUB_AUTH_ID`: Sub-user auth id (preferred when set)
// - `CLOUDNS_AUTH_PASSWORD`: API password
// - `CLOUDNS_BASE_URL`: API endpoint (default https://api.cloudns.net/dns/)
//
// ### Retries
// - `CLOUDNS_MAX_ATTEMPTS`: Attempts per remote call (default 5)
// - `CLOUDNS_INITIAL_BACKOFF_MS`: First backoff delay (default 1000)
// - `CLOUDNS_MAX_BACKOFF_MS`: Backoff ceiling (default 30000)
//
// ### Logging
// - `CLOUDNS_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// ## Record files
//
// `append`, `set` and `delete` read a JSON array of records:
//
// ```json
// [{"name": "www", "type": "A", "ttl": 300, "data": "192.0.2.1"}]
// ```
//
// For `delete`, an empty type, a zero TTL or empty data matches anything.
//
// ## Example
//
// ```bash
// export CLOUDNS_AUTH_ID=1234
// export CLOUDNS_AUTH_PASSWORD=secret
//
// cloudns-sync list example.com
// cloudns-sync set example.com records.json
// ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloudns_api::ClouDnsClient;
use cloudns_core::{ProviderConfig, Record, RetryConfig, RetryPolicy, Rr, SyncConfig, SyncEngine};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Every requested change was applied
/// - 1: Configuration or startup error
/// - 2: Runtime error (remote failure, partial set, cancellation)
#[derive(Debug, Clone, Copy)]
enum SyncExitCode {
    /// All operations succeeded
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Parser)]
#[command(name = "cloudns-sync", version, about = "Synchronize DNS records with a ClouDNS zone")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every record of a zone as JSON
    List {
        /// Zone name, with or without trailing dot
        zone: String,
    },
    /// Create the records of a file without touching existing ones
    Append { zone: String, file: PathBuf },
    /// Make each RRset named in a file match the file exactly
    Set { zone: String, file: PathBuf },
    /// Delete every record matching an entry of a file
    Delete { zone: String, file: PathBuf },
    /// Poll public resolvers until a record is visible
    #[cfg(feature = "propagation")]
    Verify {
        /// Fully qualified name to look up
        fqdn: String,
        /// Record type; only TXT compares the value
        #[arg(long = "type", default_value = "TXT")]
        record_type: String,
        /// Expected TXT value
        #[arg(long, default_value = "")]
        expected: String,
        /// Polling rounds before giving up
        #[arg(long, default_value_t = 10)]
        attempts: u32,
        /// Seconds between rounds
        #[arg(long, default_value_t = 10)]
        interval_secs: u64,
    },
}

impl Command {
    fn needs_credentials(&self) -> bool {
        match self {
            #[cfg(feature = "propagation")]
            Command::Verify { .. } => false,
            _ => true,
        }
    }
}

/// Application configuration
struct Config {
    auth_id: String,
    sub_auth_id: String,
    auth_password: String,
    base_url: Option<String>,
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let number = |key: &str| -> Result<Option<u64>> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .map(|value| {
                    value
                        .trim()
                        .parse()
                        .with_context(|| format!("{} must be a number. Got: {}", key, value))
                })
                .transpose()
        };

        Ok(Self {
            auth_id: lookup("CLOUDNS_AUTH_ID").unwrap_or_default(),
            sub_auth_id: lookup("CLOUDNS_SUB_AUTH_ID").unwrap_or_default(),
            auth_password: lookup("CLOUDNS_AUTH_PASSWORD").unwrap_or_default(),
            base_url: lookup("CLOUDNS_BASE_URL").filter(|url| !url.is_empty()),
            max_attempts: number("CLOUDNS_MAX_ATTEMPTS")?
                .map(u32::try_from)
                .transpose()
                .context("CLOUDNS_MAX_ATTEMPTS is out of range")?,
            initial_backoff_ms: number("CLOUDNS_INITIAL_BACKOFF_MS")?,
            max_backoff_ms: number("CLOUDNS_MAX_BACKOFF_MS")?,
            log_level: lookup("CLOUDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Build and validate the library configuration
    fn sync_config(&self) -> Result<SyncConfig> {
        let mut provider =
            ProviderConfig::cloudns(&*self.auth_id, &*self.sub_auth_id, &*self.auth_password);
        if let (Some(url), ProviderConfig::Cloudns { base_url, .. }) =
            (&self.base_url, &mut provider)
        {
            *base_url = url.clone();
        }

        let defaults = RetryConfig::default();
        let config = SyncConfig {
            provider,
            retry: RetryConfig {
                max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
                initial_backoff_ms: self
                    .initial_backoff_ms
                    .unwrap_or(defaults.initial_backoff_ms),
                max_backoff_ms: self.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "CLOUDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    // logs go to stderr, stdout carries JSON output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    let engine = if cli.command.needs_credentials() {
        match build_engine(&config) {
            Ok(engine) => Some(engine),
            Err(e) => {
                error!("Configuration validation error: {:#}", e);
                return SyncExitCode::ConfigError.into();
            }
        }
    } else {
        None
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let cancel = CancellationToken::new();
        tokio::spawn(cancel_on_shutdown(cancel.clone()));

        match run(cli.command, engine, &cancel).await {
            Ok(()) => SyncExitCode::Success,
            Err(e) => {
                error!("{:#}", e);
                SyncExitCode::RuntimeError
            }
        }
    })
    .into()
}

fn build_engine(config: &Config) -> Result<SyncEngine> {
    let sync_config = config.sync_config()?;
    let client = ClouDnsClient::from_config(&sync_config.provider)
        .context("Failed to create ClouDNS client")?;
    let engine = SyncEngine::new(Box::new(client), RetryPolicy::from(&sync_config.retry));
    info!(
        "Using {} provider, {} attempt(s) per call",
        engine.provider_name(),
        engine.policy().max_attempts
    );
    Ok(engine)
}

async fn run(command: Command, engine: Option<SyncEngine>, cancel: &CancellationToken) -> Result<()> {
    let require_engine = || engine.as_ref().context("ClouDNS credentials are not configured");

    match command {
        Command::List { zone } => {
            let records = require_engine()?.get_records(&zone, cancel).await?;
            info!("{} record(s) in {}", records.len(), zone);
            print_records(&records)
        }
        Command::Append { zone, file } => {
            let records = load_records(&file)?;
            let created = require_engine()?.append_records(&zone, &records, cancel).await?;
            info!("Created {} record(s) in {}", created.len(), zone);
            print_records(&created)
        }
        Command::Set { zone, file } => {
            let records = load_records(&file)?;
            let outcome = require_engine()?.set_records(&zone, &records, cancel).await?;
            info!(
                "Applied {} and removed {} record(s) in {}",
                outcome.applied.len(),
                outcome.removed.len(),
                zone
            );
            if let Some(errors) = &outcome.error {
                for failure in errors.failures() {
                    warn!("{}", failure);
                }
            }
            let applied = outcome.into_result()?;
            print_records(&applied)
        }
        Command::Delete { zone, file } => {
            let targets: Vec<Record> = load_rrs(&file)?.into_iter().map(Record::Raw).collect();
            let deleted = require_engine()?.delete_records(&zone, &targets, cancel).await?;
            info!("Deleted {} record(s) from {}", deleted.len(), zone);
            print_records(&deleted)
        }
        #[cfg(feature = "propagation")]
        Command::Verify {
            fqdn,
            record_type,
            expected,
            attempts,
            interval_secs,
        } => {
            cloudns_propagation::PropagationChecker::new()
                .verify(
                    &fqdn,
                    &record_type,
                    &expected,
                    attempts,
                    std::time::Duration::from_secs(interval_secs),
                    cancel,
                )
                .await?;
            info!("{} {} has propagated", record_type, fqdn);
            Ok(())
        }
    }
}

/// Read a JSON array of `{name, type, ttl, data}` entries
fn load_rrs(path: &Path) -> Result<Vec<Rr>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse record file {}", path.display()))
}

/// Read a record file and parse each entry into its typed form
fn load_records(path: &Path) -> Result<Vec<Record>> {
    load_rrs(path)?
        .into_iter()
        .map(|rr| {
            let label = format!("{} {}", rr.record_type, rr.name);
            Record::from_rr(rr).with_context(|| format!("Invalid record {}", label))
        })
        .collect()
}

fn print_records(records: &[Record]) -> Result<()> {
    let rrs: Vec<Rr> = records.iter().map(Record::rr).collect();
    println!("{}", serde_json::to_string_pretty(&rrs)?);
    Ok(())
}

/// Cancel `cancel` on SIGTERM or SIGINT
#[cfg(unix)]
async fn cancel_on_shutdown(cancel: CancellationToken) {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to setup signal handlers: {}", e);
                return;
            }
        };

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    info!("Received {}, cancelling", received);
    cancel.cancel();
}

/// Cancel `cancel` on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn cancel_on_shutdown(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received CTRL-C, cancelling");
            cancel.cancel();
        }
        Err(e) => warn!("Failed to wait for CTRL-C: {}", e),
    }
}
