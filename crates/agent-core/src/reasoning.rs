//! Reasoning Loop
//!
//! The agent loop: request a turn from the provider, record it, run any tool
//! calls it asked for, feed the results back, and stop on one of four
//! termination conditions.
//!
//! ```text
//!   ┌──────────── budget left? ── no ──▶ Terminated(budget-exceeded)  [error]
//!   │                 │ yes
//!   │            send_turn ── NetworkError ─▶ Terminated(provider-error) [error]
//!   │                 │
//!   │      append assistant turn
//!   │                 │
//!   │     tool calls? ── none, text ──▶ Terminated(final-text-delivered)
//!   │                 │ ── none, no text ──▶ Terminated(no-op-turn)
//!   │                 │ some
//!   └── append tool-result turn ◀── dispatch each, in order
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dispatch::ToolDispatcher;
use crate::error::{AgentError, Result};
use crate::message::{ContentBlock, Conversation, Role, Turn};
use crate::provider::{GenerationOptions, LlmProvider, TurnRequest};
use crate::tool::{Tool, ToolRegistry};

/// Why a run stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    FinalTextDelivered,
    BudgetExceeded,
    ProviderError,
    NoOpTurn,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::FinalTextDelivered => "final-text-delivered",
            Self::BudgetExceeded => "budget-exceeded",
            Self::ProviderError => "provider-error",
            Self::NoOpTurn => "no-op-turn",
        })
    }
}

/// Per-run loop bookkeeping
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoopState {
    /// Iterations started (each one is a provider request)
    pub iteration_count: usize,
    pub max_iterations: usize,
    pub terminated: bool,
    pub termination_reason: Option<TerminationReason>,
}

impl LoopState {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            iteration_count: 0,
            max_iterations,
            terminated: false,
            termination_reason: None,
        }
    }

    pub fn budget_exhausted(&self) -> bool {
        self.iteration_count >= self.max_iterations
    }

    fn terminate(&mut self, reason: TerminationReason) {
        self.terminated = true;
        self.termination_reason = Some(reason);
    }
}

/// Result of a run that did not fail
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub state: LoopState,

    /// Final answer; `None` for a no-op stop
    pub answer: Option<String>,
}

impl RunOutcome {
    pub fn reason(&self) -> Option<TerminationReason> {
        self.state.termination_reason
    }

    /// Whether the backend delivered a final text answer
    pub fn delivered(&self) -> bool {
        self.reason() == Some(TerminationReason::FinalTextDelivered)
    }
}

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt sent with every request
    pub system_prompt: Option<String>,

    /// Maximum loop iterations before the run fails
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_iterations: 7,
            generation: GenerationOptions::default(),
        }
    }
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    dispatcher: ToolDispatcher,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            dispatcher: ToolDispatcher::new(tools),
            config,
        }
    }

    /// Run the loop over `conversation`.
    ///
    /// The conversation stays with the caller, so on a fatal error the partial
    /// history is still available for diagnosis.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<RunOutcome> {
        if conversation.is_empty() {
            return Err(AgentError::Config(
                "conversation must start with a user turn".into(),
            ));
        }

        let specs = self.dispatcher.registry().describe_all();
        let mut state = LoopState::new(self.config.max_iterations);

        loop {
            if state.budget_exhausted() {
                state.terminate(TerminationReason::BudgetExceeded);
                tracing::warn!(
                    max_iterations = state.max_iterations,
                    "Reached maximum agent loops without a final text response"
                );
                return Err(AgentError::BudgetExceeded {
                    max_iterations: state.max_iterations,
                });
            }
            state.iteration_count += 1;
            tracing::info!(
                iteration = state.iteration_count,
                max = state.max_iterations,
                provider = self.provider.name(),
                "Agent loop"
            );

            let request = TurnRequest::new(conversation.snapshot(), &specs, &self.config.generation)
                .with_system_prompt(self.config.system_prompt.as_deref());

            let blocks = match self.provider.send_turn(request).await {
                Ok(raw) => self.provider.normalize_response(raw),
                Err(e) => Err(e),
            };
            let blocks = match blocks {
                Ok(blocks) => blocks,
                Err(source) => {
                    state.terminate(TerminationReason::ProviderError);
                    tracing::error!(iteration = state.iteration_count, error = %source, "Provider call failed");
                    return Err(AgentError::Provider {
                        iteration: state.iteration_count,
                        source,
                    });
                }
            };

            let turn = Turn::assistant(blocks);
            let calls: Vec<_> = turn.tool_calls().cloned().collect();
            let answer = turn.joined_text();
            conversation.append(turn);

            if calls.is_empty() {
                let reason = if answer.is_some() {
                    TerminationReason::FinalTextDelivered
                } else {
                    tracing::warn!("Backend returned neither text nor tool calls; ending loop");
                    TerminationReason::NoOpTurn
                };
                state.terminate(reason);
                tracing::info!(%reason, iterations = state.iteration_count, "Agent run finished");
                return Ok(RunOutcome { state, answer });
            }

            for call in &calls {
                tracing::info!(tool = %call.tool_name, id = %call.id, "Backend requested tool call");
            }
            let results = self.dispatcher.execute_all(&calls).await;
            conversation.append(Turn::tool_results(results));
        }
    }

    /// Run on a fresh conversation seeded with `prompt`
    pub async fn ask(&self, prompt: &str) -> (Conversation, Result<RunOutcome>) {
        let mut conversation = Conversation::with_user_prompt(prompt);
        let outcome = self.run(&mut conversation).await;
        (conversation, outcome)
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    pub fn provider(&self) -> &dyn LlmProvider {
        self.provider.as_ref()
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Check that every tool-result turn answers exactly the calls of the
/// assistant turn before it
pub fn check_tool_pairing(history: &[Turn]) -> std::result::Result<(), String> {
    for (i, turn) in history.iter().enumerate() {
        if turn.role != Role::ToolResult {
            continue;
        }
        let Some(prev) = i.checked_sub(1).map(|p| &history[p]) else {
            return Err(format!("tool-result turn {i} has no preceding turn"));
        };
        if prev.role != Role::Assistant {
            return Err(format!("tool-result turn {i} does not follow an assistant turn"));
        }
        let mut requested: Vec<&str> = prev.tool_calls().map(|c| c.id.as_str()).collect();
        let mut answered: Vec<&str> = turn.tool_results_iter().map(|r| r.tool_call_id.as_str()).collect();
        if turn.blocks.iter().any(|b| !matches!(b, ContentBlock::ToolCallResult(_))) {
            return Err(format!("tool-result turn {i} holds non-result blocks"));
        }
        requested.sort_unstable();
        answered.sort_unstable();
        if requested != answered {
            return Err(format!(
                "turn {i} answers {answered:?} but turn {} requested {requested:?}",
                i - 1
            ));
        }
    }
    Ok(())
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Result<Self> {
        self.tools.register_tool(tool)?;
        Ok(self)
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.generation.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = Some(temp);
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn generation(mut self, generation: GenerationOptions) -> Self {
        self.config.generation = generation;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}
