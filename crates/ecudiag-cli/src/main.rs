//! ecudiag - command-line tester for UDS over DoIP
//!
//! Drives the diagnostic client from a terminal: ping a gateway, derive
//! security keys offline, or connect and run UDS requests one at a time.

mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{parse_hex_u32, ClientConfig, ConnectionArgs};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "ecudiag")]
#[command(author, version, about = "UDS over DoIP diagnostic tester")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ECUDIAG_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging, including frame hex dumps
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a host is reachable
    Ping {
        /// Hostname or IP address
        host: String,
    },

    /// Compute a security access key from a seed, without connecting
    Key {
        /// Send-key sub-function: 2, 4, 6 or 8
        #[arg(long, default_value = "2")]
        level: u8,

        /// Seed as hex (e.g. B418E1A8)
        #[arg(long)]
        seed: String,

        /// Cipher constant as hex (defaults to the configured constant)
        #[arg(long)]
        constant: Option<String>,
    },

    /// Connect, send one UDS request and disconnect
    Send {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Service id as hex (e.g. 22)
        service: String,

        /// Full request as hex, service byte first (e.g. "22 F1 90")
        #[arg(default_value = "")]
        data: String,
    },

    /// Connect once and run every request in a script file
    Run {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Script with one `SERVICE DATA` request per line, `#` for comments
        script: PathBuf,

        /// Continue after a failed request
        #[arg(long)]
        keep_going: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = if let Some(config_path) = &cli.config {
        ClientConfig::load_from(config_path)?
    } else {
        ClientConfig::load().unwrap_or_default()
    };

    let ctx = OutputContext::new(cli.output, cli.no_color || config.no_color, cli.quiet);

    let success = match &cli.command {
        Commands::Ping { host } => commands::ping(host, &ctx).await,

        Commands::Key {
            level,
            seed,
            constant,
        } => {
            let constant = match constant {
                Some(text) => parse_hex_u32(text)?,
                None => config.security.constant,
            };
            commands::key(*level, seed, constant, &ctx)?
        }

        Commands::Send {
            connection,
            service,
            data,
        } => {
            let (conn, security) = config.merge_with_args(connection)?;
            commands::send(conn, security, service, data, &ctx).await
        }

        Commands::Run {
            connection,
            script,
            keep_going,
        } => {
            let (conn, security) = config.merge_with_args(connection)?;
            commands::run(conn, security, script, *keep_going, &ctx).await?
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
