//! The ReAct agent loop.
//!
//! The model speaks a plain-text protocol (`Thought:` / `Action:` /
//! `Action Input:` / `Final Answer:`). Each turn alternates between the agent
//! step, which calls the model, and the tool executor, which runs the tool the
//! model asked for, until the router sees a final answer.

mod executor;
mod message;
pub mod parser;
mod router;
mod runner;
mod step;

pub use executor::ToolExecutor;
pub use message::{ConversationState, Message, Role, ToolReference};
pub use parser::{display_text, parse_response, ParsedAction, ParsedResponse};
pub use router::{route, Route};
pub use runner::{GraphRunner, Node, StepOutput, TurnResult, TurnRun, DEFAULT_MAX_ITERATIONS};
pub use step::AgentStep;
