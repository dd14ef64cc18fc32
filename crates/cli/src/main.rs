mod config;
mod error;
mod exec;
mod smoke;
mod snippets;
mod transcript;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mcp::{Client, SessionState};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::Result;
use exec::ExecOptions;
use transcript::{Layout, Transcript};

const CONFIG_FILE: &str = "mcp-probe.toml";

#[derive(Parser)]
#[command(name = "mcp-probe")]
#[command(about = "Scripted stdio test harness for MCP servers", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./mcp-probe.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server executable to launch, overriding the config
    #[arg(long, global = true)]
    server: Option<String>,

    /// Pretty-print JSON requests and responses
    #[arg(short, long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handshake, then list tools, prompts and resources
    Smoke,
    /// Execute Python code through the execute-python tool
    Exec {
        /// Read code from the terminal
        #[arg(short, long, conflicts_with = "code")]
        interactive: bool,
        /// Execute this code once
        #[arg(short, long)]
        code: Option<String>,
        /// Comma-separated list of modules to install
        #[arg(short, long, requires = "code")]
        modules: Option<String>,
    },
}

enum Outcome {
    Completed,
    Interrupted,
}

#[tokio::main]
async fn main() {
    init_logging();

    let code = match run().await {
        Ok(Outcome::Completed) => 0,
        Ok(Outcome::Interrupted) => 1,
        Err(e) => {
            eprintln!("\nError: {e}");
            1
        }
    };
    std::process::exit(code);
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run() -> Result<Outcome> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.server.command = server;
    }
    config.validate()?;

    let (layout, response_timeout) = match cli.command {
        Commands::Smoke => (Layout::Indented, config.timing.smoke_timeout()),
        Commands::Exec { .. } => (Layout::Spaced, config.timing.response_timeout()),
    };

    let mut client = Client::new(config.server_config())
        .with_timings(config.timing.timings(response_timeout))
        .with_client_info(config.client_info())
        .with_protocol_version(config.client.protocol_version.clone())
        .with_observer(Transcript::new(cli.pretty, layout));

    tracing::debug!(server = %client.server_name(), "starting harness");

    let outcome = tokio::select! {
        result = dispatch(&cli.command, &mut client, &config) => result.map(|()| Outcome::Completed),
        _ = tokio::signal::ctrl_c() => {
            println!("\n\nInterrupted by user");
            Ok(Outcome::Interrupted)
        }
    };

    cleanup(&mut client).await;
    if matches!(cli.command, Commands::Exec { .. }) {
        println!("\nTest completed!");
    }
    outcome
}

async fn dispatch(command: &Commands, client: &mut Client, config: &Config) -> Result<()> {
    match command {
        Commands::Smoke => smoke::run(client).await,
        Commands::Exec {
            interactive,
            code,
            modules,
        } => {
            let opts = ExecOptions {
                call_timeout: config.timing.call_timeout(),
                example_pause: config.timing.example_pause(),
                result_pause: config.timing.result_pause(),
            };
            match code {
                Some(code) => exec::run_once(client, code, modules.as_deref(), &opts).await,
                None if *interactive => exec::run_interactive(client, &opts).await,
                None => exec::run_examples(client, &opts).await,
            }
        }
    }
}

/// Never leave the server running, whatever happened before.
async fn cleanup(client: &mut Client) {
    let result = if client.state() == SessionState::Ready {
        println!("\n=== Shutting down ===");
        client.drain_pending();
        client.shutdown().await
    } else {
        client.terminate().await
    };
    if let Err(e) = result {
        eprintln!("Warning: failed to stop {}: {e}", client.server_name());
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(CONFIG_FILE).exists() => Ok(Config::load(CONFIG_FILE)?),
        None => Ok(Config::default_config()),
    }
}
