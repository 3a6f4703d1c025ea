//! CLI output formatting utilities.

use crate::agent::{display_text, Message, Role};
use crate::threads::ThreadSummary;
use chrono::{DateTime, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one line of the thread listing.
    pub fn thread_info(thread: &ThreadSummary) {
        let title = if thread.title.is_empty() {
            "(untitled)"
        } else {
            thread.title.as_str()
        };
        let updated = thread
            .updated_at
            .map(|t| format!(", {}", format_age(t, Utc::now())))
            .unwrap_or_default();

        println!(
            "  {} {} ({}, {} messages{})",
            style("*").cyan(),
            style(title).bold(),
            style(&thread.thread_id).dim(),
            thread.message_count,
            updated
        );
    }

    /// Print the outcome of a tool step as a dim status line.
    pub fn tool_step(message: &Message) {
        let (name, failed) = match message.tool_reference() {
            Some(reference) => (reference.id(), reference.is_error()),
            None => ("tool", false),
        };
        let mark = if failed {
            style("✗").red()
        } else {
            style("✓").green()
        };
        println!("{} {}", style(format!("  [{}]", name)).dim(), mark);
    }

    /// Print DoctorBot's reply.
    pub fn reply(text: &str) {
        println!("\n{} {}\n", style("DoctorBot:").cyan().bold(), text);
    }

    /// Print a stored message. Tool output is shortened.
    pub fn message(message: &Message) {
        match message.role() {
            Role::User => println!("\n{} {}", style("You:").green().bold(), message.content()),
            Role::Assistant => println!(
                "\n{} {}",
                style("DoctorBot:").cyan().bold(),
                display_text(message.content())
            ),
            Role::Tool => {
                let name = message.tool_reference().map(|r| r.id()).unwrap_or("tool");
                println!(
                    "{}",
                    style(format!("  [{}] {}", name, content_preview(message.content(), 120))).dim()
                );
            }
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format how long ago a timestamp was.
fn format_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d ago", days)
    } else if hours > 0 {
        format!("{}h ago", hours)
    } else if minutes > 0 {
        format!("{}m ago", minutes)
    } else {
        "just now".to_string()
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
