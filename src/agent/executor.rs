//! Runs the tool requested by the latest agent message.

use super::message::{ConversationState, Message, ToolReference};
use super::parser::{parse_response, ParsedAction, ParsedResponse};
use crate::error::DoctorBotError;
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tracing::{info, warn};

const PARSE_ERROR_MESSAGE: &str = "Error: Could not parse tool action from agent response.";

/// Dispatches parsed actions to the tool registry.
///
/// Every failure becomes a tool message the agent can read on its next
/// step; nothing here ends the turn.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Append exactly one tool message answering the last agent message and
    /// return a copy of it.
    pub async fn execute(&self, state: &mut ConversationState) -> Message {
        let parsed = state
            .last()
            .map(|m| parse_response(m.content()))
            .unwrap_or(Ok(ParsedResponse::Unrecognized));

        let message = match parsed {
            Ok(ParsedResponse::Action(action)) => self.invoke(action).await,
            Ok(_) => {
                warn!("Tool step reached without an action request");
                Message::tool(PARSE_ERROR_MESSAGE, ToolReference::ParseError)
            }
            Err(e) => {
                warn!("{}", e);
                Message::tool(PARSE_ERROR_MESSAGE, ToolReference::ParseError)
            }
        };

        state.push(message.clone());
        message
    }

    async fn invoke(&self, action: ParsedAction) -> Message {
        let ParsedAction {
            tool_name,
            tool_input,
        } = action;

        let Some(tool) = self.registry.get(&tool_name) else {
            let err = DoctorBotError::UnknownTool(tool_name);
            warn!("{}", err);
            return Message::tool(format!("Error: {}", err), ToolReference::UnknownTool);
        };

        info!("Agent calling tool: {} with input: {}", tool_name, tool_input);

        match tool.invoke(&tool_input).await {
            Ok(output) => Message::tool(output, ToolReference::Output(tool_name)),
            Err(e) => {
                // A tool may surface lower-level errors; the agent only ever
                // sees them as a failure of that tool.
                let err = if e.is_recoverable() {
                    e
                } else {
                    DoctorBotError::tool(&tool_name, e)
                };
                warn!("{}", err);
                Message::tool(format!("Error: {}", err), ToolReference::Failed(tool_name))
            }
        }
    }
}
