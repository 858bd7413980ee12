//! Songplay ELT
//!
//! Loads the song-play event log and the song catalog from object storage
//! into ClickHouse staging tables, then reshapes them into the `songplays`
//! star schema.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use elt_core::{ConfigErrorCode, EventShape, PipelineConfig};
use telemetry::init_tracing_from_env;
use warehouse::{health, run_stages, ClickHouseClient, ClickHouseConfig, Stage};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AppConfig {
    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    pipeline: PipelineConfig,

    /// Local jsonpaths document describing the event record layout
    #[serde(default)]
    event_shape_file: Option<PathBuf>,

    /// Wall-clock limit for a whole run
    #[serde(default = "default_run_timeout_secs")]
    run_timeout_secs: u64,
}

fn default_run_timeout_secs() -> u64 {
    3600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            clickhouse: ClickHouseConfig::default(),
            pipeline: PipelineConfig::default(),
            event_shape_file: None,
            run_timeout_secs: default_run_timeout_secs(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Song-play ELT into a ClickHouse star schema")]
struct Cli {
    /// Config file, without extension
    #[arg(long, default_value = "config/default")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Drop every table and create it again
    CreateTables,
    /// Load staging from object storage, then transform
    Etl,
    /// Drop, create, load and transform
    Run,
    /// Transform the current staging snapshot
    Transform,
}

impl Command {
    fn stages(self) -> &'static [Stage] {
        match self {
            Self::CreateTables => &[Stage::Drop, Stage::Create],
            Self::Etl => &[Stage::Load, Stage::Transform],
            Self::Run => &Stage::ALL,
            Self::Transform => &[Stage::Transform],
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let cli = Cli::parse();
    let run_id = Uuid::new_v4();
    let span = info_span!("run", run_id = %run_id, command = ?cli.command);

    match run(cli).instrument(span).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code(&e);
            error!(run_id = %run_id, exit_code = code, "Run failed: {:#}", e);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting songplay ELT v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli.config)?;
    let stages = cli.command.stages();

    // Only the load stage reads the sources
    if stages.contains(&Stage::Load) {
        config.pipeline.check()?;
    }

    let client = ClickHouseClient::new(config.clickhouse.clone())
        .context("Failed to create ClickHouse client")?;

    if !health::check_connection(&client).await {
        bail!("ClickHouse at {} is unreachable", config.clickhouse.url);
    }
    if stages.contains(&Stage::Create) {
        client.ensure_database().await?;
    }

    let timeout = Duration::from_secs(config.run_timeout_secs);
    let report = tokio::time::timeout(timeout, run_stages(&client, &config.pipeline, stages))
        .await
        .with_context(|| format!("Run exceeded {}s", config.run_timeout_secs))??;

    if let Some(load) = report.load {
        info!(
            staging_events = load.staging_events,
            staging_songs = load.staging_songs,
            "Staging loaded"
        );
    }
    if let Some(t) = report.transform {
        info!(
            users = t.users,
            songs = t.songs,
            artists = t.artists,
            time = t.time,
            songplays_inserted = t.songplays_inserted,
            "Star schema updated"
        );
    }
    info!(stages = ?report.stages, "Run complete");
    Ok(())
}

/// Load configuration from defaults, the config file and the environment.
fn load_config(file: &str) -> Result<AppConfig> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&AppConfig::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name(file)
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. ELT__CLICKHOUSE__URL
        .add_source(
            config::Environment::default()
                .prefix("ELT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: AppConfig = config
        .try_deserialize()
        .map_err(|e| elt_core::Error::config(ConfigErrorCode::Invalid, e.to_string()))
        .context("Failed to deserialize configuration")?;

    if let Some(path) = &config.event_shape_file {
        let document = std::fs::read_to_string(path).map_err(|e| {
            elt_core::Error::config(
                ConfigErrorCode::InvalidEventShape,
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;
        config.pipeline.event_shape = Some(EventShape::from_json(&document)?);
    }

    info!(
        clickhouse = %config.clickhouse.url,
        database = %config.clickhouse.database,
        region = %config.pipeline.region,
        event_shape = config.pipeline.event_shape.is_some(),
        "Loaded configuration"
    );
    Ok(config)
}

/// Process exit status for a failed run.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<elt_core::Error>() {
        Some(e) => e.exit_code() as u8,
        None => 1,
    }
}
