//! toolchat: chat with an LLM that can call the tools served by
//! `toolchat-tools`.
//!
//! - `toolchat` starts the interactive REPL
//! - `toolchat -m MESSAGE` sends one message and prints the reply
//! - `toolchat --config path/to/config.json` uses a specific config file
//! - `toolchat --init` writes a default `config.json` and exits

mod helpers;
mod repl;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use toolchat_agent::{bootstrap, AgentRuntime, RuntimeError};
use toolchat_core::config::{default_config_path, load_config, save_config, Config};

use crate::repl::Outcome;
use crate::ui::{Bridge, ChatBackend, ChatHandlers};

/// Exit status after Ctrl-C, as for a shell job killed by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

/// 🛠 toolchat: a terminal chat agent with tools
#[derive(Parser)]
#[command(name = "toolchat", version, about, long_about = None)]
struct Cli {
    /// Path to config.json (defaults to ./config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Send a single message and exit
    #[arg(short, long)]
    message: Option<String>,

    /// Write a default config file (at --config or ./config.json) and exit
    #[arg(long, default_value_t = false)]
    init: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    logs: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    init_logging(cli.logs);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            helpers::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if cli.init {
        let path = cli.config.unwrap_or_else(default_config_path);
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        save_config(&Config::default(), &path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    let shutdown_timeout = Duration::from_secs(config.runtime.shutdown_timeout_secs);
    let invoke_timeout = config.runtime.invoke_timeout_secs.map(Duration::from_secs);

    let boot_config = config.clone();
    let mut runtime = AgentRuntime::start(move || async move { bootstrap(&boot_config).await })?;

    let interrupt = runtime.handle();
    ctrlc::set_handler(move || {
        warn!("interrupt received, shutting down");
        interrupt.interrupt();
    })
    .context("failed to install Ctrl-C handler")?;

    let handlers = ChatHandlers::new(Bridge::new(runtime.handle(), invoke_timeout));
    let outcome = match cli.message {
        Some(message) => single_shot(&handlers, &message),
        None => repl::run(&handlers),
    };

    runtime.shutdown(shutdown_timeout);
    info!("goodbye");

    Ok(match outcome? {
        Outcome::Finished => ExitCode::SUCCESS,
        Outcome::Interrupted => ExitCode::from(EXIT_INTERRUPTED),
    })
}

fn single_shot<B: ChatBackend>(handlers: &ChatHandlers<B>, message: &str) -> Result<Outcome> {
    match handlers.on_submit(message, Vec::new()) {
        Ok((_, history)) => {
            if let Some(reply) = history.last() {
                helpers::print_response(&reply.content);
            }
            Ok(Outcome::Finished)
        }
        Err(RuntimeError::Interrupted) => Ok(Outcome::Interrupted),
        Err(e) => Err(e).context("agent invocation failed"),
    }
}

/// Logs go to stderr so they never mix with replies on stdout.
/// `RUST_LOG` overrides the default filter.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("toolchat=debug,info")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
