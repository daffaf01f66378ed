//! lariat - MCP-enabled agent CLI

mod commands;
mod config;
mod prompts;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// lariat - agent with MCP tool integration and an evaluation harness
#[derive(Parser, Debug)]
#[command(name = "lariat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an interactive chat session with the agent
    Chat(commands::chat::ChatArgs),
    /// Run an evaluation over the backend dataset
    Eval(commands::eval::EvalArgs),
    /// Initialize config file
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "lariat=debug" } else { "lariat=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::Config::load();

    match cli.command {
        Command::Chat(args) => commands::chat::run(args, cfg).await,
        Command::Eval(args) => commands::eval::run(args, cfg).await,
        Command::InitConfig => {
            match config::Config::init() {
                Ok(path) => {
                    println!("Config file created at: {}", path.display());
                    println!("\nExample config:\n{}", config::example_config());
                }
                Err(e) => {
                    eprintln!("Error creating config: {}", e);
                    std::process::exit(1);
                }
            }
            Ok(())
        }
    }
}
