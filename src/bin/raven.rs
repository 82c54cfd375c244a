//! raven: market signal CLI
//!
//! Runs queries through the orchestrator and inspects its cache.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use raven::config::Config;
use raven::{HealthStatus, Orchestrator, QueryOutcome};
use serde::Serialize;

/// Raven CLI
#[derive(Parser)]
#[command(name = "raven")]
#[command(version = raven::PKG_VERSION)]
#[command(about = "Cached prediction-market and sentiment signals")]
struct Args {
    /// Config file (default: ~/.raven/config.toml, then /etc/raven/config.toml)
    #[arg(short, long, env = "RAVEN_CONFIG")]
    config: Option<PathBuf>,

    /// Compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a free-text query
    Query {
        /// Query text
        text: String,
        /// Force a tool instead of dispatching on the text
        #[arg(short, long)]
        tool: Option<String>,
    },

    /// List registered tools
    Tools {
        /// Include dispatch rules
        #[arg(long)]
        routing: bool,
    },

    /// Probe every tool
    Health,

    /// Inspect the cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Hit/miss counters and entry counts
    Stats,
    /// List entries, oldest first
    List {
        /// Include expired entries
        #[arg(long)]
        all: bool,
    },
    /// Remove every entry
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Command::Version = args.command {
        println!("{}", raven::version_string());
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;
    let orchestrator = config.into_builder().build()?;
    let pretty = !args.compact;

    let result = run(&orchestrator, args.command, pretty).await;
    orchestrator.shutdown();
    let code = result?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(
    orchestrator: &Orchestrator,
    command: Command,
    pretty: bool,
) -> Result<i32, Box<dyn std::error::Error>> {
    match command {
        Command::Query { text, tool } => {
            let outcome = match tool {
                Some(name) => {
                    let mut params = raven::Params::new();
                    params.insert("tool".into(), name.into());
                    params.insert("query".into(), text.as_str().into());
                    orchestrator.run(params).await
                }
                None => orchestrator.query(&text, None).await,
            };
            print_json(&outcome, pretty)?;
            if let QueryOutcome::Failure { .. } = outcome {
                return Ok(1);
            }
        }

        Command::Tools { routing } => {
            if routing {
                print_json(&orchestrator.routing_info(), pretty)?;
            } else {
                print_json(&orchestrator.list_tools(), pretty)?;
            }
        }

        Command::Health => {
            let reports = orchestrator.health().await;
            print_json(&reports, pretty)?;
            if reports.iter().any(|r| r.status == HealthStatus::Unhealthy) {
                return Ok(2);
            }
        }

        Command::Cache { command } => {
            let cache = orchestrator.cache();
            match command {
                CacheCommand::Stats => print_json(&cache.stats(), pretty)?,
                CacheCommand::List { all } => print_json(&cache.list_entries(all), pretty)?,
                CacheCommand::Clear => {
                    let removed = cache.clear();
                    cache.flush()?;
                    println!("removed {removed} entries");
                }
            }
        }

        Command::Version => println!("{}", raven::version_string()),
    }
    Ok(0)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
