//! slotburstd — the slotburst daemon.
//!
//! Single binary that assembles:
//! - Ledger and deferred-task clients (HTTP, or in-memory for local runs)
//! - Capacity controller + release executor
//! - Timer triggers
//! - REST API (add-capacity, release callback, health)
//!
//! # Usage
//!
//! ```text
//! MAX_SLOTS=500 QUEUE_ID=slot-reversals QUEUE_LOCATION=us-central1 \
//!   slotburstd serve --port 8080 --domain analytics-admin \
//!   --ledger-url https://ledger.internal --tasks-url https://tasks.internal
//! ```

mod backends;
mod dispatch;
mod serve;
mod settings;
mod timers;

use clap::{Parser, Subcommand};

use settings::SettingsArgs;

#[derive(Parser)]
#[command(name = "slotburstd", about = "Temporary capacity bursts with automatic reversal")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server and timer triggers.
    Serve {
        /// Port to listen on.
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Validate configuration and print the resolved settings.
    CheckConfig {
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,slotburstd=debug,slotburst=debug"));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    match cli.command {
        Command::Serve { port, settings } => serve::run(port, settings.load()?).await,
        Command::CheckConfig { settings } => {
            let resolved = settings.load()?;
            println!("{}", serde_json::to_string_pretty(&settings::summary(&resolved))?);
            Ok(())
        }
    }
}
