//! The single model call of the agent loop.

use super::message::{ConversationState, Message};
use crate::config::Prompts;
use crate::error::Result;
use crate::llm::Generator;
use crate::tools::ToolRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Renders the prompt from the conversation and appends the model's reply.
///
/// All tool-selection logic lives in the prompt; this type does not branch on
/// the output.
pub struct AgentStep {
    generator: Arc<dyn Generator>,
    registry: Arc<ToolRegistry>,
    prompts: Prompts,
}

impl AgentStep {
    pub fn new(generator: Arc<dyn Generator>, registry: Arc<ToolRegistry>, prompts: Prompts) -> Self {
        Self {
            generator,
            registry,
            prompts,
        }
    }

    /// Build the full prompt for the current conversation.
    pub fn render_prompt(&self, state: &ConversationState) -> String {
        let mut vars = HashMap::new();
        vars.insert("tool_descriptions".to_string(), self.registry.describe());
        vars.insert("tool_names".to_string(), self.registry.names());

        // The transcript goes in last so text typed by the user is never
        // treated as a template variable.
        let rendered = self
            .prompts
            .render_with_custom(&self.prompts.agent.template, &vars);
        rendered.replace("{{messages}}", &state.transcript())
    }

    /// Call the model once and append its reply as an assistant message.
    ///
    /// Generation errors propagate unchanged and leave `state` untouched.
    pub async fn run(&self, state: &mut ConversationState) -> Result<Message> {
        let prompt = self.render_prompt(state);
        debug!("Agent prompt is {} characters", prompt.len());

        let completion = self.generator.generate(&prompt).await?;
        let message = Message::assistant(completion);
        state.push(message.clone());
        Ok(message)
    }
}
