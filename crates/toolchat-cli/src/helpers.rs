//! Terminal output: banner, role-tagged messages, progress line.

use colored::Colorize;

use toolchat_core::types::{Role, Turn};

pub fn print_banner() {
    println!();
    println!(
        "{}  v{}",
        "🛠  toolchat".cyan().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!(
        "{}",
        "Type a message. /reset clears the chat, /tools lists tools, \"exit\" quits.".dimmed()
    );
    println!();
}

fn role_tag(role: Role) -> colored::ColoredString {
    match role {
        Role::User => "You".green().bold(),
        Role::Assistant => "Assistant".cyan().bold(),
    }
}

/// Print the agent's reply.
pub fn print_response(response: &str) {
    println!();
    println!("{}", role_tag(Role::Assistant));
    if response.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{response}");
    }
    println!();
}

/// Reprint the whole display history.
pub fn print_history(history: &[Turn]) {
    if history.is_empty() {
        println!("{}", "(no messages yet)".dimmed());
        return;
    }
    for turn in history {
        println!("{}: {}", role_tag(turn.role), turn.content);
    }
    println!();
}

pub fn print_tools(names: &[String]) {
    if names.is_empty() {
        println!("{}", "No tools available.".yellow());
        return;
    }
    println!("{}", "Tools:".bold());
    for name in names {
        println!("  • {name}");
    }
    println!();
}

pub fn print_notice(text: &str) {
    println!("{}", text.dimmed());
}

pub fn print_error(err: &dyn std::fmt::Display) {
    eprintln!("\n{} {err}\n", "❌ Error:".red().bold());
}

pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}
