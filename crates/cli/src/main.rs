//! ferrodesk CLI, the main entry point.
//!
//! Commands:
//! - `serve`     Start the HTTP gateway
//! - `chat`      Interactive conversation in the terminal
//! - `ask`       Run a single turn and print the response envelope
//! - `memories`  Inspect long-term memory for a customer
//! - `events`    List the logged turns of a session
//! - `config`    Print the effective configuration or write the defaults

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ferrodesk",
    about = "ferrodesk: customer-service orchestrator with tiered memory",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (defaults to ~/.ferrodesk/config.toml)
    #[arg(short, long, global = true, env = "FERRODESK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the assistant in the terminal
    Chat {
        #[arg(short, long, default_value = "cli-user")]
        user_id: String,

        /// Continue an existing session instead of starting a new one
        #[arg(short, long)]
        session_id: Option<String>,
    },

    /// Run a single turn and print the JSON envelope
    Ask {
        prompt: String,

        #[arg(short, long)]
        user_id: String,

        #[arg(short, long)]
        session_id: Option<String>,
    },

    /// Show long-term memory records for a customer
    Memories {
        #[arg(short, long)]
        user_id: String,

        /// Needed to read conversation summaries
        #[arg(short, long)]
        session_id: Option<String>,
    },

    /// List logged turns of a session, oldest first
    Events {
        #[arg(short, long)]
        user_id: String,

        #[arg(short, long)]
        session_id: String,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the effective configuration (secrets redacted)
    Config {
        /// Write a default config file instead
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    // Logs go to stderr so command output on stdout stays parseable.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(config_path, host, port).await?,
        Commands::Chat { user_id, session_id } => {
            commands::chat::run(config_path, user_id, session_id).await?
        }
        Commands::Ask {
            prompt,
            user_id,
            session_id,
        } => commands::ask::run(config_path, prompt, user_id, session_id).await?,
        Commands::Memories { user_id, session_id } => {
            commands::memories::run(config_path, &user_id, session_id.as_deref()).await?
        }
        Commands::Events {
            user_id,
            session_id,
            limit,
        } => commands::events::run(config_path, &user_id, &session_id, limit).await?,
        Commands::Config { init, force } => commands::config_cmd::run(config_path, init, force)?,
    }

    Ok(())
}
