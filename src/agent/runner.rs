//! Drives one conversational turn through the agent/tool graph.
//!
//! ```text
//! start -> Agent --(route)--> Tools -> Agent ... --(route)--> Terminated
//! ```
//!
//! A turn is advanced one node at a time with [`TurnRun::next_step`], so
//! callers can render progress as it happens. The thread snapshot is written
//! exactly once, when the turn terminates.

use super::executor::ToolExecutor;
use super::message::{ConversationState, Message, Role};
use super::parser::{display_text, FINAL_ANSWER_MARKER};
use super::router::{route, Route};
use super::step::AgentStep;
use crate::error::{DoctorBotError, Result};
use crate::threads::{ThreadStore, ThreadSummary};
use futures::Stream;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of agent steps allowed per turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 8;

/// Graph nodes, as reported with each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Agent,
    Tools,
    Terminated,
}

/// One executed node and the message it appended.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub node: Node,
    pub message: Message,
}

/// Outcome of a completed turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub thread_id: String,
    /// Messages appended during this turn, starting with the user message.
    pub new_messages: Vec<Message>,
    /// Display text of the final assistant message.
    pub answer: String,
    pub max_turns_exceeded: bool,
}

/// Owns the agent graph and the thread store it checkpoints into.
pub struct GraphRunner {
    step: AgentStep,
    executor: ToolExecutor,
    store: Arc<dyn ThreadStore>,
    max_iterations: usize,
}

impl GraphRunner {
    pub fn new(step: AgentStep, executor: ToolExecutor, store: Arc<dyn ThreadStore>) -> Self {
        Self {
            step,
            executor,
            store,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the maximum number of agent steps per turn (at least one).
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Begin a turn: load the thread, append the user's message and position
    /// the run at the agent node. Nothing is written yet.
    pub async fn start(&self, thread_id: &str, user_input: &str) -> Result<TurnRun<'_>> {
        let mut state = self.load_conversation(thread_id).await?;
        let turn_start = state.len();
        state.push(Message::user(user_input));

        debug!(
            "Starting turn on thread {} with {} prior messages",
            thread_id, turn_start
        );

        Ok(TurnRun {
            runner: self,
            thread_id: thread_id.to_string(),
            state,
            turn_start,
            position: Position::Agent,
            agent_steps: 0,
            max_turns_exceeded: false,
        })
    }

    /// Run a whole turn and return what it added.
    pub async fn run_turn(&self, thread_id: &str, user_input: &str) -> Result<TurnResult> {
        let mut run = self.start(thread_id, user_input).await?;
        while run.next_step().await?.is_some() {}
        Ok(run.into_result())
    }

    /// Stored conversation for a thread, `None` if it was never stored.
    pub async fn find_conversation(&self, thread_id: &str) -> Result<Option<ConversationState>> {
        self.store.get(thread_id).await
    }

    /// Stored conversation for a thread, empty if the thread is unknown.
    pub async fn load_conversation(&self, thread_id: &str) -> Result<ConversationState> {
        Ok(self.find_conversation(thread_id).await?.unwrap_or_default())
    }

    pub async fn thread_ids(&self) -> Result<BTreeSet<String>> {
        self.store.list_ids().await
    }

    pub async fn list_threads(&self) -> Result<Vec<ThreadSummary>> {
        self.store.list_threads().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Agent,
    Tools,
    /// The cap was hit; the next step appends the forced answer.
    Cap,
    Done,
}

/// An in-progress turn.
///
/// Dropping it before it terminates discards the turn; the store keeps the
/// previous snapshot.
pub struct TurnRun<'a> {
    runner: &'a GraphRunner,
    thread_id: String,
    state: ConversationState,
    turn_start: usize,
    position: Position,
    agent_steps: usize,
    max_turns_exceeded: bool,
}

impl<'a> TurnRun<'a> {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Node the next call to [`TurnRun::next_step`] will execute.
    pub fn node(&self) -> Node {
        match self.position {
            Position::Agent | Position::Cap => Node::Agent,
            Position::Tools => Node::Tools,
            Position::Done => Node::Terminated,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.node() == Node::Terminated
    }

    /// Execute exactly one node. Returns `None` once the turn has terminated.
    ///
    /// A generation error ends the run without writing anything.
    pub async fn next_step(&mut self) -> Result<Option<StepOutput>> {
        match self.position {
            Position::Done => Ok(None),
            Position::Agent => {
                self.agent_steps += 1;
                let message = match self.runner.step.run(&mut self.state).await {
                    Ok(message) => message,
                    Err(e) => {
                        self.position = Position::Done;
                        return Err(e);
                    }
                };

                match route(&self.state) {
                    Route::ContinueToTools if self.agent_steps >= self.runner.max_iterations => {
                        let err = DoctorBotError::MaxTurnsExceeded(self.runner.max_iterations);
                        warn!("Thread {}: {}", self.thread_id, err);
                        self.max_turns_exceeded = true;
                        self.position = Position::Cap;
                    }
                    Route::ContinueToTools => self.position = Position::Tools,
                    Route::Terminate => self.finish().await?,
                }

                Ok(Some(StepOutput {
                    node: Node::Agent,
                    message,
                }))
            }
            Position::Tools => {
                let message = self.runner.executor.execute(&mut self.state).await;
                self.position = Position::Agent;
                Ok(Some(StepOutput {
                    node: Node::Tools,
                    message,
                }))
            }
            Position::Cap => {
                let message = Message::assistant(forced_answer(&self.state));
                self.state.push(message.clone());
                self.finish().await?;
                Ok(Some(StepOutput {
                    node: Node::Agent,
                    message,
                }))
            }
        }
    }

    /// Write the in-progress state without ending the turn.
    pub async fn persist_snapshot(&self) -> Result<()> {
        self.runner.store.put(&self.thread_id, &self.state).await
    }

    /// Steps of this turn as a stream. Errors end the stream after being
    /// yielded.
    pub fn into_stream(self) -> impl Stream<Item = Result<StepOutput>> + 'a {
        futures::stream::unfold(self, |mut run| async move {
            match run.next_step().await {
                Ok(Some(step)) => Some((Ok(step), run)),
                Ok(None) => None,
                Err(e) => Some((Err(e), run)),
            }
        })
    }

    /// Summarize the turn. Meaningful once the run has terminated.
    pub fn into_result(self) -> TurnResult {
        let answer = self
            .state
            .messages()
            .iter()
            .rev()
            .find(|m| m.role() == Role::Assistant)
            .map(|m| display_text(m.content()))
            .unwrap_or_default();

        let new_messages = self.state.messages()[self.turn_start..].to_vec();

        TurnResult {
            thread_id: self.thread_id,
            new_messages,
            answer,
            max_turns_exceeded: self.max_turns_exceeded,
        }
    }

    async fn finish(&mut self) -> Result<()> {
        self.position = Position::Done;
        self.runner.store.put(&self.thread_id, &self.state).await?;
        info!(
            "Turn on thread {} finished after {} agent steps ({} messages)",
            self.thread_id,
            self.agent_steps,
            self.state.len()
        );
        Ok(())
    }
}

fn forced_answer(state: &ConversationState) -> String {
    let gathered = state
        .last_tool_output()
        .filter(|m| !m.tool_reference().is_some_and(|r| r.is_error()))
        .map(|m| m.content().trim())
        .filter(|c| !c.is_empty());

    match gathered {
        Some(found) => format!(
            "{} I wasn't able to finish looking into this, but here is what I found so far:\n\n{}\n\n\
             Only a licensed healthcare professional can provide a real diagnosis, so please consult one.",
            FINAL_ANSWER_MARKER, found
        ),
        None => format!(
            "{} I'm sorry, I wasn't able to complete my research on this question. \
             Please consult a licensed healthcare professional.",
            FINAL_ANSWER_MARKER
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::ToolReference;
    use crate::agent::step::testing::ScriptedGenerator;
    use crate::config::Prompts;
    use crate::threads::MemoryThreadStore;
    use crate::tools::testing::StubTool;
    use crate::tools::{Tool, ToolRegistry};
    use futures::StreamExt;

    struct Harness {
        runner: GraphRunner,
        store: Arc<MemoryThreadStore>,
        generator: Arc<ScriptedGenerator>,
    }

    fn harness(generator: Arc<ScriptedGenerator>, tools: Vec<Arc<dyn Tool>>) -> Harness {
        let registry = Arc::new(ToolRegistry::new(tools));
        let store = Arc::new(MemoryThreadStore::new());
        let runner = GraphRunner::new(
            AgentStep::new(generator.clone(), registry.clone(), Prompts::default()),
            ToolExecutor::new(registry),
            store.clone(),
        );
        Harness {
            runner,
            store,
            generator,
        }
    }

    fn retriever() -> Arc<StubTool> {
        StubTool::ok("retriever_tool", "Common causes: viral infection, flu.")
    }

    #[tokio::test]
    async fn test_tool_round_trip_then_answer() {
        let tool = retriever();
        let h = harness(
            ScriptedGenerator::new([
                "Thought: check causes\nAction: retriever_tool\nAction Input: fever causes",
                "Final Answer: Possible causes include viral infection. Please consult a doctor.",
            ]),
            vec![tool.clone()],
        );

        let result = h.runner.run_turn("t1", "I have a fever").await.unwrap();

        assert_eq!(tool.calls(), vec!["fever causes"]);
        assert_eq!(
            result.answer,
            "Possible causes include viral infection. Please consult a doctor."
        );
        assert!(!result.max_turns_exceeded);

        let roles: Vec<Role> = result.new_messages.iter().map(|m| m.role()).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(
            result.new_messages[2].tool_reference(),
            Some(&ToolReference::Output("retriever_tool".to_string()))
        );

        let stored = h.store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.messages(), result.new_messages.as_slice());
    }

    #[tokio::test]
    async fn test_steps_report_nodes_in_order() {
        let h = harness(
            ScriptedGenerator::new([
                "Action: retriever_tool\nAction Input: fever causes",
                "Final Answer: Rest.",
            ]),
            vec![retriever()],
        );

        let mut run = h.runner.start("t1", "fever").await.unwrap();
        let mut nodes = Vec::new();
        while let Some(step) = run.next_step().await.unwrap() {
            nodes.push(step.node);
        }

        assert_eq!(nodes, vec![Node::Agent, Node::Tools, Node::Agent]);
        assert!(run.is_terminated());
        assert!(run.next_step().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_final_answer_terminates_immediately() {
        let tool = retriever();
        let h = harness(
            ScriptedGenerator::new([
                "Final Answer: Possible causes include viral infection. Please consult a doctor.",
            ]),
            vec![tool.clone()],
        );

        let result = h.runner.run_turn("t1", "fever?").await.unwrap();

        assert!(tool.calls().is_empty());
        assert_eq!(result.new_messages.len(), 2);
        assert_eq!(h.generator.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_loops_back_to_agent() {
        let h = harness(
            ScriptedGenerator::new([
                "Action: unknown_tool\nAction Input: x",
                "Final Answer: Sorry about that.",
            ]),
            vec![retriever()],
        );

        let result = h.runner.run_turn("t1", "hello").await.unwrap();

        assert_eq!(result.new_messages[2].content(), "Error: Unknown tool 'unknown_tool'");
        assert_eq!(result.answer, "Sorry about that.");
        assert_eq!(h.generator.prompt_count(), 2);

        let second_prompt = h.generator.prompts.lock().unwrap()[1].clone();
        assert!(second_prompt.contains("Tool[unknown_tool]: Error: Unknown tool 'unknown_tool'"));
    }

    #[tokio::test]
    async fn test_unrecognized_output_terminates_without_tools() {
        let tool = retriever();
        let h = harness(
            ScriptedGenerator::new(["I am thinking about this."]),
            vec![tool.clone()],
        );

        let result = h.runner.run_turn("t1", "hello").await.unwrap();

        assert!(tool.calls().is_empty());
        assert_eq!(result.answer, "I am thinking about this.");
        assert_eq!(h.store.get("t1").await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_turns_accumulate_on_same_thread() {
        let h = harness(
            ScriptedGenerator::new(["Final Answer: first", "Final Answer: second"]),
            vec![retriever()],
        );

        h.runner.run_turn("t1", "one").await.unwrap();
        let first_len = h.runner.load_conversation("t1").await.unwrap().len();

        h.runner.run_turn("t1", "two").await.unwrap();
        let second = h.runner.load_conversation("t1").await.unwrap();

        assert!(second.len() >= first_len);
        assert_eq!(second.len(), 4);
        assert_eq!(second.messages()[0].content(), "one");

        let second_prompt = h.generator.prompts.lock().unwrap()[1].clone();
        assert!(second_prompt.contains("User: one\nAssistant: Final Answer: first\nUser: two"));
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let h = harness(
            ScriptedGenerator::new(["Final Answer: a", "Final Answer: b"]),
            vec![retriever()],
        );

        h.runner.run_turn("a", "first thread").await.unwrap();
        h.runner.run_turn("b", "second thread").await.unwrap();

        let ids: Vec<String> = h.runner.thread_ids().await.unwrap().into_iter().collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(h.runner.load_conversation("b").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_conversation_distinguishes_unknown_threads() {
        let h = harness(ScriptedGenerator::new(["Final Answer: ok"]), vec![retriever()]);

        assert!(h.runner.find_conversation("t1").await.unwrap().is_none());
        assert!(h.runner.load_conversation("t1").await.unwrap().is_empty());

        h.runner.run_turn("t1", "hello").await.unwrap();

        let found = h.runner.find_conversation("t1").await.unwrap().unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_generation_error_persists_nothing() {
        let h = harness(
            ScriptedGenerator::new(["Action: retriever_tool\nAction Input: fever"])
                .then_fail("upstream 500"),
            vec![retriever()],
        );

        let err = h.runner.run_turn("t1", "fever").await.unwrap_err();

        assert!(matches!(err, DoctorBotError::Generation(_)));
        assert!(h.store.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generation_error_keeps_previous_snapshot() {
        let h = harness(
            ScriptedGenerator::new(["Final Answer: hi"]).then_fail("upstream 500"),
            vec![retriever()],
        );

        h.runner.run_turn("t1", "hello").await.unwrap();
        assert!(h.runner.run_turn("t1", "again").await.is_err());

        assert_eq!(h.store.get("t1").await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_run_persists_nothing() {
        let h = harness(
            ScriptedGenerator::new([
                "Action: retriever_tool\nAction Input: fever",
                "Final Answer: never reached",
            ]),
            vec![retriever()],
        );

        {
            let mut run = h.runner.start("t1", "fever").await.unwrap();
            run.next_step().await.unwrap();
            run.next_step().await.unwrap();
            assert_eq!(run.state().len(), 3);
        }

        assert!(h.store.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_snapshot_stores_progress() {
        let h = harness(
            ScriptedGenerator::new(["Action: retriever_tool\nAction Input: fever"]),
            vec![retriever()],
        );

        let mut run = h.runner.start("t1", "fever").await.unwrap();
        run.next_step().await.unwrap();
        run.persist_snapshot().await.unwrap();

        assert_eq!(h.store.get("t1").await.unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_iteration_cap_forces_answer() {
        let looping = "Action: retriever_tool\nAction Input: fever";
        let h = harness(
            ScriptedGenerator::new([looping, looping, looping, looping]),
            vec![retriever()],
        );
        let runner = h.runner.with_max_iterations(2);

        let result = runner.run_turn("t1", "fever").await.unwrap();

        assert!(result.max_turns_exceeded);
        assert_eq!(h.generator.prompt_count(), 2);
        assert!(result.answer.contains("Common causes: viral infection, flu."));

        // user, agent, tool, agent, forced answer
        assert_eq!(result.new_messages.len(), 5);
        let last = result.new_messages.last().unwrap();
        assert_eq!(last.role(), Role::Assistant);
        assert!(last.content().starts_with(FINAL_ANSWER_MARKER));

        assert_eq!(h.store.get("t1").await.unwrap().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_forced_answer_without_tool_output() {
        let h = harness(
            ScriptedGenerator::new(["Action: retriever_tool\nAction Input: fever"]),
            vec![retriever()],
        );
        let runner = h.runner.with_max_iterations(1);

        let result = runner.run_turn("t1", "fever").await.unwrap();

        assert!(result.max_turns_exceeded);
        assert!(result.answer.contains("consult a licensed healthcare professional"));
    }

    #[tokio::test]
    async fn test_stream_yields_each_step() {
        let h = harness(
            ScriptedGenerator::new([
                "Action: retriever_tool\nAction Input: fever",
                "Final Answer: Rest.",
            ]),
            vec![retriever()],
        );

        let run = h.runner.start("t1", "fever").await.unwrap();
        let steps: Vec<StepOutput> = run
            .into_stream()
            .map(|s| s.unwrap())
            .collect()
            .await;

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].node, Node::Tools);
        assert_eq!(steps[2].message.content(), "Final Answer: Rest.");
        assert!(h.store.get("t1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stream_ends_after_error() {
        let h = harness(
            ScriptedGenerator::new(Vec::<String>::new()).then_fail("boom"),
            vec![retriever()],
        );

        let run = h.runner.start("t1", "fever").await.unwrap();
        let items: Vec<Result<StepOutput>> = run.into_stream().collect().await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
