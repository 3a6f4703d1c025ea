//! Conversation messages and the state threaded through the agent loop.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
            Role::Tool => write!(f, "Tool"),
        }
    }
}

/// Which tool produced a tool-role message, and whether it is an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tool", rename_all = "snake_case")]
pub enum ToolReference {
    /// Successful output of the named tool.
    Output(String),
    /// The named tool was invoked and failed.
    Failed(String),
    /// The agent asked for a tool that is not registered.
    UnknownTool,
    /// The agent's action could not be parsed.
    ParseError,
}

impl ToolReference {
    /// Identifier recorded against the tool message.
    pub fn id(&self) -> &str {
        match self {
            ToolReference::Output(tool) | ToolReference::Failed(tool) => tool,
            ToolReference::UnknownTool => "unknown_tool",
            ToolReference::ParseError => "parse_error",
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, ToolReference::Output(_))
    }
}

/// One entry in a conversation. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_reference: Option<ToolReference>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_reference: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_reference: None,
        }
    }

    pub fn tool(content: impl Into<String>, reference: ToolReference) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_reference: Some(reference),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Present only on tool-role messages.
    pub fn tool_reference(&self) -> Option<&ToolReference> {
        self.tool_reference.as_ref()
    }

    /// Render as a transcript line for the agent prompt.
    pub fn transcript_line(&self) -> String {
        match &self.tool_reference {
            Some(reference) => format!("{}[{}]: {}", self.role, reference.id(), self.content),
            None => format!("{}: {}", self.role, self.content),
        }
    }
}

/// Ordered, append-only message history for one thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. This is the only way the history changes.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent tool-role message, if any.
    pub fn last_tool_output(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Tool)
    }

    /// Full transcript, one message per line.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(Message::transcript_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<Message>> for ConversationState {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_reference_ids() {
        assert_eq!(ToolReference::Output("retriever_tool".into()).id(), "retriever_tool");
        assert_eq!(ToolReference::Failed("retriever_tool".into()).id(), "retriever_tool");
        assert_eq!(ToolReference::UnknownTool.id(), "unknown_tool");
        assert_eq!(ToolReference::ParseError.id(), "parse_error");
        assert!(ToolReference::Failed("x".into()).is_error());
        assert!(!ToolReference::Output("x".into()).is_error());
    }

    #[test]
    fn test_transcript_rendering() {
        let state = ConversationState::from(vec![
            Message::user("I have a fever"),
            Message::assistant("Action: retriever_tool\nAction Input: fever"),
            Message::tool("Fever is often viral.", ToolReference::Output("retriever_tool".into())),
        ]);

        let transcript = state.transcript();
        assert!(transcript.starts_with("User: I have a fever\nAssistant: Action:"));
        assert!(transcript.ends_with("Tool[retriever_tool]: Fever is often viral."));
    }

    #[test]
    fn test_serde_shape() {
        let msg = Message::tool("boom", ToolReference::Failed("tavily_search".into()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_reference"]["kind"], "failed");
        assert_eq!(json["tool_reference"]["tool"], "tavily_search");

        let user = serde_json::to_value(Message::user("hi")).unwrap();
        assert!(user.get("tool_reference").is_none());
    }

    #[test]
    fn test_last_tool_output() {
        let mut state = ConversationState::new();
        assert!(state.last_tool_output().is_none());
        state.push(Message::tool("one", ToolReference::UnknownTool));
        state.push(Message::assistant("thinking"));
        assert_eq!(state.last_tool_output().map(Message::content), Some("one"));
    }
}
