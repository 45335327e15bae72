mod cache;
mod commands;
mod config;
mod logging;
mod rate_limit;
mod server;
mod tools;
mod ynab;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ynab-agent")]
#[command(about = "YNAB tools for conversational agents, backed by a local delta-sync cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/ynab-agent/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Budget id to use when a call doesn't name one
  #[arg(short, long)]
  budget: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Serve line-delimited JSON tool calls on stdin (default)
  Serve,
  /// Run a single tool and print its output
  Call {
    /// Tool name or alias
    tool: String,
    /// Tool arguments as a JSON object
    args: Option<String>,
  },
  /// List available tools
  Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override default budget if specified on command line
  let config = if let Some(budget) = args.budget {
    config::Config {
      ynab: config::YnabConfig {
        default_budget: Some(budget),
        ..config.ynab
      },
      ..config
    }
  } else {
    config
  };

  let _log_guard = logging::init(&config);

  match args.command.unwrap_or(Command::Serve) {
    Command::Tools => {
      print!("{}", tools::render_tool_list());
    }
    Command::Call { tool, args } => {
      let args = match args {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| eyre!("Invalid JSON arguments: {}", e))?,
        None => serde_json::Value::Null,
      };
      let client = ynab::cached_client::CachedYnabClient::new(&config)?;
      let call = tools::ToolCall { tool, args };
      let output = tools::dispatch(&client, config.default_budget(), &call).await?;
      println!("{}", output.trim_end());
    }
    Command::Serve => {
      let client = ynab::cached_client::CachedYnabClient::new(&config)?;
      server::serve(client, config.default_budget().to_string()).await?;
    }
  }

  Ok(())
}
