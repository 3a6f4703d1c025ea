//! Decides where control goes after an agent step.

use super::message::ConversationState;
use super::parser::{is_action_request, is_terminal};

/// Next node after the agent has spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ContinueToTools,
    Terminate,
}

/// Inspect the latest message only.
///
/// Output with no recognized markers terminates the turn rather than looping.
pub fn route(state: &ConversationState) -> Route {
    let Some(last) = state.last() else {
        return Route::Terminate;
    };

    let content = last.content();
    if is_terminal(content) {
        Route::Terminate
    } else if is_action_request(content) {
        Route::ContinueToTools
    } else {
        Route::Terminate
    }
}
