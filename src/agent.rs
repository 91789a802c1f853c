//! Agent Loop - the core of the runtime.
//!
//! An `AgentSession` owns one provider adapter, one model client, one tool
//! executor and one conversation history. Each user input runs a cycle:
//!
//! ```text
//! User Input
//!     |
//!     v
//! +---------+     +-------+     +--------+
//! | Adapter |<--->| Agent |<--->| Tools  |
//! +---------+     +-------+     +--------+
//!     |               |
//!     v               v
//! Model Client    History
//! ```
//!
//! The cycle keeps calling the model until it answers with text. Every
//! batch of tool calls is executed in emission order and fully answered
//! before the next model call.

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::history::ConversationHistory;
use crate::llm::{ModelClient, ProviderAdapter};
use crate::tools::ToolExecutor;
use crate::types::{ProviderResponse, Turn};

/// Where the session is in its input/processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingUserInput,
    ProcessingTurn,
    Terminated,
}

/// What one call to [`AgentSession::handle_input`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input, nothing happened.
    Ignored,
    /// The user asked to leave; the session is terminated.
    Exit,
    /// The model's final answer for this cycle.
    Reply(String),
}

/// Progress notifications emitted while a cycle runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Prose the model emitted alongside a tool-call batch.
    LlmText(String),
    ToolStart { name: String, arguments: String },
    ToolEnd { name: String, result: String },
    /// The final answer of the cycle.
    Done(String),
    Error(String),
}

/// True for the commands that end a session (`quit`, `exit`, `q`).
pub fn is_exit_command(input: &str) -> bool {
    matches!(
        input.trim().to_lowercase().as_str(),
        "quit" | "exit" | "q"
    )
}

fn emit(events: &Option<UnboundedSender<AgentEvent>>, event: AgentEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

pub struct AgentSession {
    adapter: Box<dyn ProviderAdapter>,
    client: Box<dyn ModelClient>,
    executor: Box<dyn ToolExecutor>,
    history: ConversationHistory,
    system_prompt: String,
    max_iterations: u32,
    state: LoopState,
}

impl AgentSession {
    pub fn new(
        adapter: Box<dyn ProviderAdapter>,
        client: Box<dyn ModelClient>,
        executor: Box<dyn ToolExecutor>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            adapter,
            client,
            executor,
            history: ConversationHistory::new(),
            system_prompt: config.system_prompt.clone(),
            max_iterations: config.max_iterations.max(1),
            state: LoopState::AwaitingUserInput,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn provider_name(&self) -> &str {
        self.adapter.name()
    }

    /// Forget the conversation so far.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Feed one line of user input through the loop.
    ///
    /// Errors end the current cycle only: the history is rolled back to
    /// where it was before this input and the session goes back to
    /// awaiting input.
    pub async fn handle_input(
        &mut self,
        input: &str,
        events: Option<UnboundedSender<AgentEvent>>,
    ) -> Result<TurnOutcome, AgentError> {
        if self.state == LoopState::Terminated {
            return Ok(TurnOutcome::Exit);
        }

        let input = input.trim();
        if input.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }
        if is_exit_command(input) {
            info!("Session terminated by user");
            self.state = LoopState::Terminated;
            return Ok(TurnOutcome::Exit);
        }

        let checkpoint = self.history.len();
        self.state = LoopState::ProcessingTurn;
        let result = self.run_cycle(input, &events).await;
        self.state = LoopState::AwaitingUserInput;

        match result {
            Ok(reply) => Ok(TurnOutcome::Reply(reply)),
            Err(e) => {
                warn!(error = %e, "Cycle failed, rolling back history");
                self.history.truncate(checkpoint);
                emit(&events, AgentEvent::Error(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_cycle(
        &mut self,
        input: &str,
        events: &Option<UnboundedSender<AgentEvent>>,
    ) -> Result<String, AgentError> {
        self.history.push(Turn::user(input))?;
        let tools = self.executor.descriptors();
        info!(provider = self.adapter.name(), "Processing user turn");

        let mut iterations = 0;
        loop {
            if iterations >= self.max_iterations {
                let stopped = format!(
                    "[Agent stopped: reached maximum of {} iterations]",
                    self.max_iterations
                );
                warn!(max_iterations = self.max_iterations, "Iteration limit reached");
                self.history.push(Turn::assistant(stopped.clone()))?;
                emit(events, AgentEvent::Done(stopped.clone()));
                return Ok(stopped);
            }
            iterations += 1;

            let request =
                self.adapter
                    .translate_outbound(&self.history, &self.system_prompt, &tools)?;
            debug!(
                iteration = iterations,
                turns = self.history.len(),
                client = self.client.name(),
                "Calling model"
            );
            let raw = self.client.send(&request).await?;

            match self.adapter.translate_inbound(raw)? {
                ProviderResponse::Text(text) => {
                    // An empty assistant message would poison every later
                    // Anthropic request.
                    if text.trim().is_empty() {
                        warn!("Model returned an empty reply; not recording it");
                    } else {
                        self.history.push(Turn::assistant(text.clone()))?;
                    }
                    emit(events, AgentEvent::Done(text.clone()));
                    return Ok(text);
                }
                ProviderResponse::ToolCalls { preamble, calls } => {
                    if let Some(text) = &preamble {
                        emit(events, AgentEvent::LlmText(text.clone()));
                    }
                    self.adapter.append_assistant_tool_call_turn(
                        &mut self.history,
                        preamble.as_deref(),
                        &calls,
                    )?;

                    for invocation in &calls {
                        let arguments = Value::Object(invocation.arguments.clone()).to_string();
                        info!(tool = %invocation.name, args = %arguments, "Tool call");
                        emit(
                            events,
                            AgentEvent::ToolStart {
                                name: invocation.name.clone(),
                                arguments,
                            },
                        );

                        let result = self.executor.execute(invocation).await;

                        emit(
                            events,
                            AgentEvent::ToolEnd {
                                name: invocation.name.clone(),
                                result: result.clone(),
                            },
                        );
                        self.adapter
                            .append_tool_result_turn(&mut self.history, invocation, &result)?;
                    }
                    // The model sees the results on the next iteration.
                }
            }
        }
    }
}
