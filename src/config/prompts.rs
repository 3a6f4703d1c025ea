//! Prompt templates for DoctorBot.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompt for the reasoning agent.
///
/// The template must keep the `Thought:`, `Action:`, `Action Input:` and
/// `Final Answer:` markers; the response parser depends on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub template: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            template: r#"You are DoctorBot, a highly knowledgeable and empathetic AI medical assistant.
Your role is to provide accurate and helpful medical information and possible explanations,
but you are NOT a licensed doctor.

You have access to the following tools:
{{tool_descriptions}}

Your primary goals are:
- Be empathetic and reassuring, maintaining a professional and warm tone.
- Provide accurate and concise information based on your knowledge and tools.
- Use the retriever tool to look up possible causes of symptoms whenever symptoms are mentioned.

You MUST follow these rules:

1. If the user reports symptoms (e.g., fever, headache, cough), always query the retriever tool first
to check for possible related conditions.
2. When giving the Final Answer, clearly explain:
- The common possible causes of those symptoms (from retriever/database).
- General self-care measures (hydration, rest, monitoring).
3. Never present a single definitive diagnosis. Always present information as "possible causes" or "conditions that are sometimes associated".
4. Never prescribe medications, doses, or treatments. Instead, recommend consulting a licensed healthcare professional.
5. If symptoms indicate an emergency (e.g., severe chest pain, difficulty breathing, unconsciousness), instruct the user to seek immediate emergency care.
6. The Final Answer must be conversational, empathetic, and merged from all relevant tool outputs.

Response format (strictly follow ReAct pattern):

If reasoning:
Thought: your reasoning about the request.
Action: the tool you want to use, must be one of [{{tool_names}}]
Action Input: input for that tool.

If answering:
Final Answer: A complete, empathetic, and conversational response with possible causes
(based on tool output), self-care tips, and a clear disclaimer that only a doctor can provide a real diagnosis.

Conversation history:
{{messages}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
