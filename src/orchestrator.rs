// ABOUTME: Per-turn orchestration: dispatch to the model, execute requested tools, repeat
// ABOUTME: Owns the retry policy that maps provider failures to fixed advisory replies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # Orchestrator
//!
//! One [`Orchestrator::submit_user_turn`] call handles a complete user turn:
//!
//! 1. Rebuild the system prompt from the session's verification state and
//!    window the history to its trailing turns.
//! 2. Dispatch to the model with the full tool catalog attached.
//! 3. If the model requests function calls, execute them in order through the
//!    bridge, feed each result back as a `[Tool Result for ...]` message, and
//!    dispatch again. At most [`limits::MAX_TOOL_ROUNDS`] rounds per turn.
//! 4. The first text-only reply ends the turn. When the rounds run out, the
//!    last text the model produced alongside its tool calls becomes the
//!    reply; a fixed apology covers the case where there was none.
//!
//! Every dispatch runs under the retry policy: rate limits back off
//! exponentially (1s, 2s) before surfacing a rate-limit advisory,
//! configuration errors surface immediately, anything else waits a flat
//! second between attempts. Advisory replies are ordinary assistant text and
//! are recorded in history like any other reply.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::bridge::{self, ToolOutcome};
use crate::config::TechDeskConfig;
use crate::constants::{limits, messages};
use crate::errors::AppError;
use crate::llm::{prompts, ChatMessage, ChatRequest, ChatResponseWithTools, LlmProvider};
use crate::mcp::McpClient;
use crate::session::{ConversationSession, TurnRole};

/// Orchestration knobs, resolved once at startup
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Model override passed to the provider, if any
    pub model: Option<String>,
    /// Provider-call attempts per dispatch
    pub max_retries: u32,
    /// Maximum dispatch/execute rounds per user turn
    pub max_tool_rounds: usize,
    /// Whether to append the tools-used footer to replies
    pub show_tool_appendix: bool,
}

impl OrchestratorSettings {
    /// Derive settings from runtime configuration
    #[must_use]
    pub fn from_config(config: &TechDeskConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_retries: config.max_retries,
            max_tool_rounds: limits::MAX_TOOL_ROUNDS,
            show_tool_appendix: config.show_tool_appendix,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            model: None,
            max_retries: limits::DEFAULT_MAX_RETRIES,
            max_tool_rounds: limits::MAX_TOOL_ROUNDS,
            show_tool_appendix: false,
        }
    }
}

/// Everything a completed turn produced
#[derive(Debug)]
pub struct TurnReply {
    /// Final assistant text, already recorded in the session
    pub text: String,
    /// Tool calls executed during the turn, in execution order
    pub tool_outcomes: Vec<ToolOutcome>,
}

/// The conversation engine: one per process, shared across turns
pub struct Orchestrator {
    provider: Box<dyn LlmProvider>,
    mcp: McpClient,
    settings: OrchestratorSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator from its parts
    #[must_use]
    pub fn new(
        provider: Box<dyn LlmProvider>,
        mcp: McpClient,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            provider,
            mcp,
            settings,
        }
    }

    /// The transport client, exposed for tool discovery in the binary
    #[must_use]
    pub const fn mcp(&self) -> &McpClient {
        &self.mcp
    }

    /// Handle one user message end to end
    ///
    /// Always produces a reply: provider failures and exhausted tool rounds
    /// come back as fixed advisory text, never as `Err`. Both the user
    /// message and the final reply are recorded in the session before
    /// returning.
    #[instrument(skip(self, session, user_message), fields(session = %session.id))]
    pub async fn submit_user_turn(
        &self,
        session: &mut ConversationSession,
        user_message: &str,
    ) -> TurnReply {
        session.push_user(user_message);

        let mut llm_messages = self.build_messages(session);
        let mut tool_outcomes = Vec::new();
        let mut reply_text = None;
        let mut last_model_text: Option<String> = None;

        for round in 1..=self.settings.max_tool_rounds {
            let request = self.build_request(llm_messages.clone());
            let response = match self.dispatch_with_retry(&request).await {
                Ok(response) => response,
                Err(e) => {
                    reply_text = Some(advisory_for(&e));
                    break;
                }
            };

            if !response.has_function_calls() {
                reply_text = Some(match response.content {
                    Some(text) if !text.is_empty() => text,
                    _ => messages::EMPTY_RESPONSE.to_owned(),
                });
                break;
            }

            let calls = response.function_calls.unwrap_or_default();
            info!(round, count = calls.len(), "executing requested tool calls");

            if let Some(ref text) = response.content {
                if !text.is_empty() {
                    llm_messages.push(ChatMessage::assistant(text));
                    last_model_text = Some(text.clone());
                }
            }

            let outcomes =
                bridge::execute_function_calls(&self.mcp, &calls, session.verification_mut(), round)
                    .await;

            // A verification may have just landed; rebuild the system prompt
            // so this round's results are answered with customer context.
            if let Some(first) = llm_messages.first_mut() {
                *first = ChatMessage::system(prompts::build_system_prompt(session.verification()));
            }

            for outcome in &outcomes {
                llm_messages.push(ChatMessage::user(format!(
                    "[Tool Result for {}]: {}",
                    outcome.tool_name, outcome.result
                )));
            }
            tool_outcomes.extend(outcomes);
        }

        // Round cap reached: answer with whatever text the model last
        // produced alongside its tool calls, apologizing only if there was
        // none at all.
        let mut text = reply_text.unwrap_or_else(|| {
            warn!(
                rounds = self.settings.max_tool_rounds,
                "tool round cap reached without a final text reply"
            );
            last_model_text.unwrap_or_else(|| messages::EMPTY_RESPONSE.to_owned())
        });

        if self.settings.show_tool_appendix && !tool_outcomes.is_empty() {
            text.push_str(&tool_appendix(&tool_outcomes));
        }

        session.push_assistant(&text);
        TurnReply {
            text,
            tool_outcomes,
        }
    }

    /// Build the model context: system prompt plus the windowed history
    ///
    /// The just-pushed user message is part of the window.
    fn build_messages(&self, session: &ConversationSession) -> Vec<ChatMessage> {
        let mut llm_messages = vec![ChatMessage::system(prompts::build_system_prompt(
            session.verification(),
        ))];
        for turn in session.recent_turns() {
            llm_messages.push(match turn.role {
                TurnRole::User => ChatMessage::user(&turn.content),
                TurnRole::Assistant => ChatMessage::assistant(&turn.content),
            });
        }
        llm_messages
    }

    fn build_request(&self, llm_messages: Vec<ChatMessage>) -> ChatRequest {
        let mut request = ChatRequest::new(llm_messages);
        if let Some(ref model) = self.settings.model {
            request = request.with_model(model.clone());
        }
        request
    }

    /// Dispatch to the provider under the retry policy
    ///
    /// Rate limits wait `2^attempt` seconds between attempts (1s, 2s with the
    /// default budget of three). Configuration errors are never retried.
    /// Other failures wait a flat second. The last error is returned once the
    /// budget is spent.
    async fn dispatch_with_retry(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatResponseWithTools, AppError> {
        let tools = Some(crate::catalog::gemini_toolset());
        let max_retries = self.settings.max_retries.max(1);

        for attempt in 0..max_retries {
            match self
                .provider
                .complete_with_tools(request, tools.clone())
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) if e.is_config() => {
                    warn!(error = %e, "configuration error, not retrying");
                    return Err(e);
                }
                Err(e) if attempt + 1 == max_retries => {
                    warn!(error = %e, attempt, "retry budget exhausted");
                    return Err(e);
                }
                Err(e) if e.is_rate_limit() => {
                    let wait = Duration::from_secs(1 << attempt);
                    debug!(error = %e, attempt, wait_secs = wait.as_secs(), "rate limited, backing off");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    debug!(error = %e, attempt, "transient provider failure, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        // Unreachable: the loop always returns on the final attempt.
        Err(AppError::internal("retry loop ended without a result"))
    }
}

/// Map a dispatch failure to the fixed advisory shown to the user
fn advisory_for(error: &AppError) -> String {
    if error.is_rate_limit() {
        messages::RATE_LIMIT.to_owned()
    } else if error.is_config() {
        format!("{}\n\n*Error: {error}*", messages::CONFIG_ERROR)
    } else {
        format!("{}\n\n*Error: {error}*", messages::GENERIC_ERROR)
    }
}

/// Render the optional tools-used footer
fn tool_appendix(outcomes: &[ToolOutcome]) -> String {
    let mut appendix = String::from("\n\n---\n*Tools used:*\n");
    for outcome in outcomes {
        let args = serde_json::to_string(&outcome.arguments).unwrap_or_else(|_| "{}".to_owned());
        appendix.push_str(&format!("- `{}({})`\n", outcome.tool_name, args));
    }
    appendix
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_advisory_selection() {
        assert_eq!(
            advisory_for(&AppError::rate_limited("quota")),
            messages::RATE_LIMIT
        );
        let config = advisory_for(&AppError::config("bad key"));
        assert!(config.starts_with(messages::CONFIG_ERROR));
        assert!(config.contains("bad key"));
        let generic = advisory_for(&AppError::internal("boom"));
        assert!(generic.starts_with(messages::GENERIC_ERROR));
    }

    #[test]
    fn test_tool_appendix_format() {
        let outcomes = vec![ToolOutcome {
            tool_name: "search_products".into(),
            arguments: json!({"query": "monitor"}),
            result: "two hits".into(),
            round: 1,
        }];
        let appendix = tool_appendix(&outcomes);
        assert!(appendix.contains("*Tools used:*"));
        assert!(appendix.contains("`search_products({\"query\":\"monitor\"})`"));
    }
}
