//! Interactive REPL with persistent line history.

use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use toolchat_agent::RuntimeError;
use toolchat_core::types::Turn;

use crate::helpers;
use crate::ui::{ChatBackend, ChatHandlers};

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    /// Ctrl-C arrived while the agent was working.
    Interrupted,
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Exit,
    Reset,
    Tools,
    History,
    Help,
    Message(&'a str),
}

fn parse_command(input: &str) -> Command<'_> {
    let lower = input.to_lowercase();
    if EXIT_COMMANDS.contains(&lower.as_str()) {
        return Command::Exit;
    }
    match lower.as_str() {
        "/reset" | "/clear" => Command::Reset,
        "/tools" => Command::Tools,
        "/history" => Command::History,
        "/help" => Command::Help,
        _ => Command::Message(input),
    }
}

pub fn run<B: ChatBackend>(handlers: &ChatHandlers<B>) -> Result<Outcome> {
    helpers::print_banner();

    let mut editor = create_editor()?;
    let mut history: Vec<Turn> = Vec::new();
    let mut outcome = Outcome::Finished;

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            // Ctrl-C at the prompt or Ctrl-D: leave quietly.
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                helpers::print_error(&e);
                break;
            }
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(trimmed);

        match parse_command(trimmed) {
            Command::Exit => {
                println!("\nGoodbye! 👋");
                break;
            }
            Command::Help => helpers::print_banner(),
            Command::History => helpers::print_history(&history),
            Command::Tools => match handlers.backend().tool_names() {
                Ok(names) => helpers::print_tools(&names),
                Err(e) => helpers::print_error(&e),
            },
            Command::Reset => match handlers.on_reset() {
                Ok((_, cleared)) => {
                    history = cleared;
                    helpers::print_notice("Conversation cleared.");
                }
                Err(e) => helpers::print_error(&e),
            },
            Command::Message(text) => {
                debug!(input = text, "submitting");
                helpers::print_thinking();
                let result = handlers.on_submit(text, history.clone());
                helpers::clear_thinking();

                match result {
                    Ok((_, updated)) => {
                        history = updated;
                        if let Some(reply) = history.last() {
                            helpers::print_response(&reply.content);
                        }
                    }
                    Err(RuntimeError::Interrupted) => {
                        outcome = Outcome::Interrupted;
                        break;
                    }
                    Err(e) => helpers::print_error(&e),
                }
            }
        }
    }

    save_history(&mut editor);
    Ok(outcome)
}

fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let path = history_path();
    if path.exists() {
        let _ = editor.load_history(&path);
        debug!("loaded REPL history from {}", path.display());
    }
    Ok(editor)
}

fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

fn history_path() -> std::path::PathBuf {
    toolchat_core::utils::get_data_path()
        .join("history")
        .join("cli_history")
}
