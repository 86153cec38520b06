// BigQuery MCP Gateway - Main Entry Point
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// CLI and MCP stdio server. Every query routes through the SQL gate.
// Usage:
//   mcp-server-bigquery --project-id <id> [--location <loc>] [--key-file <path>]   # Run MCP server (stdio)
//   mcp-server-bigquery --project-id <id> qualify "<sql>" [--dataset-id <ds>]      # One-shot gate + qualify

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use mcp_server_bigquery::{
    bigquery::BigQueryClient,
    config::{Profile, ServerConfig, DEFAULT_LOCATION},
    credentials::Credentials,
    error::QualificationError,
    mcp, qualify,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mcp-server-bigquery")]
#[command(version)]
#[command(about = "MCP server for read-only BigQuery access")]
struct Cli {
    /// Google Cloud project to run queries in
    #[arg(long)]
    project_id: String,

    /// BigQuery location (region) for query jobs
    #[arg(long, default_value = DEFAULT_LOCATION)]
    location: String,

    /// Service account key file (JSON)
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Server flavor: extended adds dataset hints, sample queries and prompts
    #[arg(long, value_enum, default_value_t = Profile::Extended)]
    profile: Profile,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run MCP server (stdio JSON-RPC). Default when no command is given.
    Serve,

    /// Gate and qualify one query, print the SQL that would run
    Qualify {
        /// SQL text
        sql: String,

        /// Dataset hint for bare table names
        #[arg(long)]
        dataset_id: Option<String>,
    },
}

/// Help and version exit 0. Every other argv problem is a startup failure.
fn parse_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(parse_exit_code(e.kind()));
        }
    }
}

/// One-shot gate + qualify, with the dataset hint filtered by profile
fn qualify_once(config: &ServerConfig, sql: &str, dataset_id: Option<&str>) -> Result<String, QualificationError> {
    qualify::qualify(sql, config.identity.project_id(), config.dataset_hint(dataset_id))
}

fn main() -> Result<()> {
    // stderr only: stdout carries JSON-RPC
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init();

    let cli = parse_cli();

    let config = ServerConfig::new(&cli.project_id, &cli.location, cli.key_file.clone(), cli.profile)
        .context("Invalid configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            log::info!(
                "Initializing BigQuery with project ID: {} and location: {}",
                config.identity.project_id(),
                config.identity.location()
            );
            if let Some(key_file) = &config.key_file {
                log::info!("Using service account key file: {}", key_file.display());
            }

            let credentials = Credentials::discover(config.key_file.as_deref())
                .context("Failed to load credentials")?;
            log::info!("Authenticating as {}", credentials.describe());

            let client = BigQueryClient::new(&config.identity, credentials)
                .context("Failed to create BigQuery client")?;

            mcp::serve(config, client).context("MCP server I/O failed")?;
        }

        Commands::Qualify { sql, dataset_id } => {
            match qualify_once(&config, &sql, dataset_id.as_deref()) {
                Ok(qualified) => println!("{}", qualified),
                Err(e) => {
                    eprintln!("REJECTED: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
