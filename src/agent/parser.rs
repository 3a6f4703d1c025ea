//! Parsing of the textual ReAct protocol emitted by the model.
//!
//! Markers are case-sensitive and must match exactly:
//! `Thought:`, `Action:`, `Action Input:`, `Final Answer:`.

use crate::error::{DoctorBotError, Result};
use regex::Regex;
use std::sync::LazyLock;

pub const THOUGHT_MARKER: &str = "Thought:";
pub const ACTION_MARKER: &str = "Action:";
pub const ACTION_INPUT_MARKER: &str = "Action Input:";
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";

// Remainder of the marker's own line; `[ \t]*` keeps the match from running
// onto the next line when the value is missing.
static ACTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action:[ \t]*([^\r\n]*)").expect("Invalid regex"));
static ACTION_INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Action Input:[ \t]*([^\r\n]*)").expect("Invalid regex"));

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction {
    pub tool_name: String,
    pub tool_input: String,
}

/// What a piece of generated text asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    /// Text following `Final Answer:`.
    Terminal(String),
    Action(ParsedAction),
    /// Neither marker set was found.
    Unrecognized,
}

/// True when the text carries the terminal marker.
pub fn is_terminal(text: &str) -> bool {
    text.contains(FINAL_ANSWER_MARKER)
}

/// True when the text carries both action markers.
pub fn is_action_request(text: &str) -> bool {
    text.contains(ACTION_MARKER) && text.contains(ACTION_INPUT_MARKER)
}

/// Classify generated text. The terminal marker wins over action markers.
///
/// Returns [`DoctorBotError::MalformedAction`] when both action markers are
/// present but the tool name or its input is empty.
pub fn parse_response(text: &str) -> Result<ParsedResponse> {
    if is_terminal(text) {
        return Ok(ParsedResponse::Terminal(display_text(text)));
    }

    if !is_action_request(text) {
        return Ok(ParsedResponse::Unrecognized);
    }

    let tool_name = capture(&ACTION_RE, text)
        .ok_or_else(|| DoctorBotError::MalformedAction("missing action name".to_string()))?;
    let tool_input = capture(&ACTION_INPUT_RE, text)
        .ok_or_else(|| DoctorBotError::MalformedAction("missing action input".to_string()))?;

    Ok(ParsedResponse::Action(ParsedAction {
        tool_name,
        tool_input,
    }))
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Text to show the user: everything after `Final Answer:`, or the whole
/// content when the marker is absent.
pub fn display_text(content: &str) -> String {
    match content.find(FINAL_ANSWER_MARKER) {
        Some(idx) => content[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string(),
        None => content.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        let parsed = parse_response(
            "Thought: I should look this up.\nAction: retriever_tool\nAction Input: fever causes",
        )
        .unwrap();
        assert_eq!(
            parsed,
            ParsedResponse::Action(ParsedAction {
                tool_name: "retriever_tool".to_string(),
                tool_input: "fever causes".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_final_answer() {
        let parsed = parse_response(
            "Final Answer: Possible causes include viral infection. Please consult a doctor.",
        )
        .unwrap();
        assert_eq!(
            parsed,
            ParsedResponse::Terminal(
                "Possible causes include viral infection. Please consult a doctor.".to_string()
            )
        );
    }

    #[test]
    fn test_terminal_takes_priority() {
        let parsed = parse_response(
            "Action: retriever_tool\nAction Input: cough\nFinal Answer: Rest and hydrate.",
        )
        .unwrap();
        assert_eq!(parsed, ParsedResponse::Terminal("Rest and hydrate.".to_string()));
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(
            parse_response("I am thinking about this.").unwrap(),
            ParsedResponse::Unrecognized
        );
        // A lone action marker is not a tool request.
        assert_eq!(
            parse_response("Action: retriever_tool").unwrap(),
            ParsedResponse::Unrecognized
        );
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        assert_eq!(
            parse_response("final answer: lowercase").unwrap(),
            ParsedResponse::Unrecognized
        );
        assert_eq!(
            parse_response("action: x\naction input: y").unwrap(),
            ParsedResponse::Unrecognized
        );
    }

    #[test]
    fn test_empty_action_name_is_malformed() {
        let err = parse_response("Action:\nAction Input: fever").unwrap_err();
        assert!(matches!(err, DoctorBotError::MalformedAction(_)));
    }

    #[test]
    fn test_empty_action_input_is_malformed() {
        let err = parse_response("Action: retriever_tool\nAction Input:   ").unwrap_err();
        assert!(matches!(err, DoctorBotError::MalformedAction(_)));
    }

    #[test]
    fn test_values_are_trimmed_and_single_line() {
        let parsed = parse_response(
            "Action:   tavily_search  \r\nAction Input:  flu season 2024 \nObservation: pending",
        )
        .unwrap();
        assert_eq!(
            parsed,
            ParsedResponse::Action(ParsedAction {
                tool_name: "tavily_search".to_string(),
                tool_input: "flu season 2024".to_string(),
            })
        );
    }

    #[test]
    fn test_display_text() {
        assert_eq!(
            display_text("Thought: done.\nFinal Answer:  Drink fluids. "),
            "Drink fluids."
        );
        assert_eq!(display_text("  plain reply "), "plain reply");
    }
}
