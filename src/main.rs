mod cli;
mod config;
mod expr;
mod filter;
mod logging;
mod server;
mod steps;
mod transport;
mod workflow;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::{CancellationToken, OutputMode};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pipewright")]
#[command(about = "Run workflow graphs of HTTP, transform and filter steps")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory holding .pipewright/config.toml (defaults to current)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,

    /// Also append logs to this file ("default" picks a timestamped file)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow graph and print every step result
    Run {
        /// Graph document (JSON or TOML)
        graph: PathBuf,

        /// Output mode: console, json or quiet
        #[arg(long, default_value = "console")]
        output: String,

        /// Steps allowed in flight at once (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Check a graph for problems without running it
    Validate {
        /// Graph document (JSON or TOML)
        graph: PathBuf,
    },

    /// Print the order steps would run in
    Plan {
        /// Graph document (JSON or TOML)
        graph: PathBuf,
    },

    /// Serve the filter collaborator over HTTP
    Serve {
        /// Address to listen on (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Validate { .. } => "validate",
            Self::Plan { .. } => "plan",
            Self::Serve { .. } => "serve",
            Self::Config => "config",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match cli.log_file {
        Some(path) if path.as_os_str() == "default" => {
            Some(logging::default_log_path(cli.command.name())?)
        }
        other => other,
    };
    logging::init_logging(cli.debug, cli.quiet, log_file)?;

    let project_dir = cli.dir.as_deref();
    let config = config::PipewrightConfig::load(project_dir).context("loading configuration")?;

    let mode = if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Console
    };

    let exit_code = match cli.command {
        Commands::Run {
            graph,
            output,
            concurrency,
        } => {
            let mode = if cli.quiet {
                OutputMode::Quiet
            } else {
                OutputMode::from_str(&output)
            };
            let handler = cli::create_handler(mode, cli.debug);

            let mut options = workflow::RunOptions::from_config(&config.defaults);
            if let Some(n) = concurrency {
                options = options.with_max_concurrency(n);
            }

            let executors = cli::build_executors(&config).map_err(anyhow::Error::msg)?;
            let token = CancellationToken::new();
            tokio::spawn(cli::setup_signal_handlers(token.clone()));

            cli::run_graph(&graph, executors, options, token, &*handler)
                .await
                .map_err(anyhow::Error::msg)?
        }

        Commands::Validate { graph } => {
            let handler = cli::create_handler(mode, cli.debug);
            cli::validate_graph(&graph, &*handler)
        }

        Commands::Plan { graph } => {
            let handler = cli::create_handler(mode, cli.debug);
            cli::plan_graph(&graph, &*handler)
        }

        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let filter = filter::create_local_filter(&config)?;

            let token = CancellationToken::new();
            tokio::spawn(cli::setup_signal_handlers(token.clone()));

            server::serve(&bind, Arc::new(filter), token).await?;
            0
        }

        Commands::Config => {
            let handler = cli::create_handler(OutputMode::Console, cli.debug);
            cli::show_config(&config, &*handler).map_err(anyhow::Error::msg)?
        }
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
