//! Interactive consultation with resumable threads.

use super::GENERATION_FAILED_NOTICE;
use crate::agent::parser::{is_action_request, is_terminal};
use crate::agent::{display_text, GraphRunner, Message, Node, Role};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::threads::new_thread_id;
use anyhow::Result;
use console::style;
use futures::StreamExt;
use std::io::{self, BufRead, Write};
use tracing::error;

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum ChatCommand<'a> {
    Exit,
    New,
    Threads,
    Switch(&'a str),
    Help,
    Ask(&'a str),
}

impl<'a> ChatCommand<'a> {
    fn parse(input: &'a str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let lower = input.to_ascii_lowercase();
        let command = match lower.as_str() {
            "exit" | "quit" => ChatCommand::Exit,
            "new" => ChatCommand::New,
            "threads" => ChatCommand::Threads,
            "help" => ChatCommand::Help,
            _ => match input.split_once(char::is_whitespace) {
                Some((cmd, id)) if cmd.eq_ignore_ascii_case("switch") && !id.trim().is_empty() => {
                    ChatCommand::Switch(id.trim())
                }
                _ => ChatCommand::Ask(input),
            },
        };
        Some(command)
    }
}

/// Run the interactive chat command.
pub async fn run_chat(thread: Option<String>, model: Option<String>, settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'doctorbot doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings, model.as_deref())?;
    let runner = orchestrator.runner();

    println!("\n{}", style("DoctorBot").bold().cyan());
    println!(
        "{}",
        style("I can share general medical information, but I am not a doctor.").dim()
    );
    println!(
        "{}\n",
        style("Type your question, 'new' for a new conversation, 'threads' to list, 'switch <id>', or 'exit'.")
            .dim()
    );

    let mut thread_id = match thread {
        Some(id) => {
            replay(&runner, &id).await?;
            id
        }
        None => new_thread_id(),
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let Some(command) = ChatCommand::parse(&input) else {
            continue;
        };

        match command {
            ChatCommand::Exit => {
                Output::info("Take care!");
                break;
            }
            ChatCommand::New => {
                thread_id = new_thread_id();
                Output::info("Started a new conversation.");
            }
            ChatCommand::Threads => {
                for summary in runner.list_threads().await? {
                    Output::thread_info(&summary);
                }
                Output::kv("Current", &thread_id);
            }
            ChatCommand::Switch(id) => {
                if runner.find_conversation(id).await?.is_some() {
                    thread_id = id.to_string();
                    replay(&runner, &thread_id).await?;
                } else {
                    Output::warning(&format!("No conversation with id {}", id));
                }
            }
            ChatCommand::Help => {
                Output::list_item("new - start a new conversation");
                Output::list_item("threads - list past conversations");
                Output::list_item("switch <id> - resume a conversation");
                Output::list_item("exit - leave");
            }
            ChatCommand::Ask(question) => {
                take_turn(&runner, &thread_id, question).await;
            }
        }
    }

    Ok(())
}

/// Run one turn, printing tool calls as they happen and the reply at the end.
///
/// Failures are reported and leave the stored thread untouched.
async fn take_turn(runner: &GraphRunner, thread_id: &str, question: &str) {
    let run = match runner.start(thread_id, question).await {
        Ok(run) => run,
        Err(e) => {
            error!("Failed to load thread {}: {}", thread_id, e);
            Output::error(&format!("Could not load this conversation: {}", e));
            return;
        }
    };

    let spinner = Output::spinner("Thinking...");
    let mut steps = std::pin::pin!(run.into_stream());

    while let Some(step) = steps.next().await {
        match step {
            Ok(step) if step.node == Node::Tools => {
                spinner.suspend(|| Output::tool_step(&step.message));
            }
            Ok(step) => {
                if is_reply(&step.message) {
                    spinner.finish_and_clear();
                    Output::reply(&display_text(step.message.content()));
                }
            }
            Err(e) => {
                spinner.finish_and_clear();
                error!("Turn failed on thread {}: {}", thread_id, e);
                Output::error(GENERATION_FAILED_NOTICE);
                return;
            }
        }
    }

    spinner.finish_and_clear();
}

/// Print the user-facing part of a stored conversation.
async fn replay(runner: &GraphRunner, thread_id: &str) -> Result<()> {
    let state = runner.load_conversation(thread_id).await?;
    if state.is_empty() {
        Output::info(&format!("Starting conversation {}", thread_id));
        return Ok(());
    }

    Output::info(&format!("Resuming conversation {}", thread_id));
    for message in state.messages().iter().filter(|m| is_visible(m)) {
        Output::message(message);
    }
    println!();
    Ok(())
}

/// Assistant output that ends a turn, as opposed to a tool request.
fn is_reply(message: &Message) -> bool {
    let content = message.content();
    is_terminal(content) || !is_action_request(content)
}

fn is_visible(message: &Message) -> bool {
    match message.role() {
        Role::User => true,
        Role::Assistant => is_reply(message),
        Role::Tool => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ToolReference;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ChatCommand::parse("  "), None);
        assert_eq!(ChatCommand::parse("EXIT"), Some(ChatCommand::Exit));
        assert_eq!(ChatCommand::parse("quit\n"), Some(ChatCommand::Exit));
        assert_eq!(ChatCommand::parse("new"), Some(ChatCommand::New));
        assert_eq!(ChatCommand::parse("threads"), Some(ChatCommand::Threads));
        assert_eq!(
            ChatCommand::parse("switch 1234-abcd"),
            Some(ChatCommand::Switch("1234-abcd"))
        );
        assert_eq!(
            ChatCommand::parse("I have a new rash"),
            Some(ChatCommand::Ask("I have a new rash"))
        );
        assert_eq!(ChatCommand::parse("switch"), Some(ChatCommand::Ask("switch")));
    }

    #[test]
    fn test_visible_messages() {
        assert!(is_visible(&Message::user("fever")));
        assert!(is_visible(&Message::assistant("Final Answer: rest")));
        assert!(is_visible(&Message::assistant("I am thinking about this.")));
        assert!(!is_visible(&Message::assistant(
            "Action: retriever_tool\nAction Input: fever"
        )));
        assert!(!is_visible(&Message::tool(
            "docs",
            ToolReference::Output("retriever_tool".into())
        )));
    }
}
