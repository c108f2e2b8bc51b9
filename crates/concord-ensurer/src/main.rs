//! Room ensurer daemon binary.
//!
//! Designed to run indefinitely under a supervisor: invalid credentials
//! or configuration fail startup immediately, everything else is logged
//! and retried on the next interval.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use concord_ensurer::{EnsurerConfig, Scheduler};
use concord_federation::{ServerName, ServerRegistry};
use concord_matrix::Credentials;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "concord-ensurer", about = "Ensures federated rooms stay consistent")]
struct Cli {
    /// Name of the server this process is responsible for.
    #[arg(long)]
    own_server: String,

    /// Seconds between reconciliation runs. 0 runs a single pass and exits.
    #[arg(short, long, default_value_t = 3600)]
    interval: u64,

    /// Log level filter.
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Path to the JSON credentials file ({"username": ..., "password": ...}).
    #[arg(short, long)]
    credentials_file: PathBuf,

    /// Path to the JSON known-servers file. Falls back to the
    /// CONCORD_KNOWN_SERVERS environment variable, then to a
    /// single-server federation.
    #[arg(short, long)]
    known_servers: Option<PathBuf>,

    /// Apply restricted moderation power levels to rooms this process creates.
    #[arg(long)]
    restrict_moderation: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "concord_ensurer={0},concord_matrix={0},concord_federation={0}",
                    cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting room ensurer for {}", cli.own_server);

    let own_server = ServerName::new(cli.own_server);

    // Bad credentials are fatal: there is nothing to retry.
    let credentials = Credentials::from_json_file(&cli.credentials_file).map_err(|err| {
        tracing::error!("Invalid credentials file: {}", err);
        err
    })?;

    let registry = match &cli.known_servers {
        Some(path) => ServerRegistry::from_json_file(path)?,
        None => ServerRegistry::from_env_or_default(&own_server)?,
    };

    let config = EnsurerConfig::new(own_server)
        .with_interval(Duration::from_secs(cli.interval))
        .with_restrict_moderation(cli.restrict_moderation);

    let mut scheduler = Scheduler::new(config, registry, credentials)?;
    scheduler.run().await?;

    Ok(())
}
