// ABOUTME: Integration tests for the per-turn orchestration loop with a scripted provider
// ABOUTME: Covers tool rounds, the round cap, retry timing and verification context injection
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use url::Url;

use techdesk::constants::messages;
use techdesk::errors::AppError;
use techdesk::llm::{
    ChatRequest, ChatResponseWithTools, FunctionCall, LlmCapabilities, LlmProvider, MessageRole,
    Tool,
};
use techdesk::mcp::McpClient;
use techdesk::orchestrator::{Orchestrator, OrchestratorSettings};
use techdesk::session::ConversationSession;

/// One scripted provider reply
enum Step {
    Text(&'static str),
    Calls(Vec<FunctionCall>),
    TextAndCalls(String, Vec<FunctionCall>),
    RateLimited,
    ConfigError,
    Flaky,
}

/// Test double that replays a script and records every request it saw
struct ScriptedProvider {
    script: Mutex<Vec<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn calls_made(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn display_name(&self) -> &'static str {
        "Scripted Provider"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::tool_calling()
    }

    fn default_model(&self) -> &str {
        "scripted-1"
    }

    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        _tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponseWithTools, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        let step = {
            let mut script = self.script.lock().unwrap();
            assert!(!script.is_empty(), "provider called more times than scripted");
            script.remove(0)
        };
        match step {
            Step::Text(text) => Ok(reply_text(text)),
            Step::Calls(calls) => Ok(reply_calls(calls)),
            Step::TextAndCalls(text, calls) => Ok(ChatResponseWithTools {
                content: Some(text),
                ..reply_calls(calls)
            }),
            Step::RateLimited => Err(AppError::rate_limited("quota exhausted")),
            Step::ConfigError => Err(AppError::config("bad API key")),
            Step::Flaky => Err(AppError::internal("upstream hiccup")),
        }
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(true)
    }
}

fn reply_text(text: &str) -> ChatResponseWithTools {
    ChatResponseWithTools {
        content: Some(text.to_owned()),
        function_calls: None,
        model: "scripted-1".into(),
        usage: None,
        finish_reason: Some("stop".into()),
    }
}

fn reply_calls(calls: Vec<FunctionCall>) -> ChatResponseWithTools {
    ChatResponseWithTools {
        content: None,
        function_calls: Some(calls),
        model: "scripted-1".into(),
        usage: None,
        finish_reason: None,
    }
}

/// Orchestrator whose MCP client points nowhere (for no-tool scripts)
fn orchestrator_without_server(script: Vec<Step>) -> (Orchestrator, &'static ScriptedProvider) {
    let provider: &'static ScriptedProvider = Box::leak(Box::new(ScriptedProvider::new(script)));
    let mcp = McpClient::new(Url::parse("http://127.0.0.1:9/mcp").unwrap()).unwrap();
    let orchestrator = Orchestrator::new(
        Box::new(ProviderRef(provider)),
        mcp,
        OrchestratorSettings::default(),
    );
    (orchestrator, provider)
}

/// Thin forwarding wrapper so tests keep a handle to the leaked provider
struct ProviderRef(&'static ScriptedProvider);

#[async_trait]
impl LlmProvider for ProviderRef {
    fn name(&self) -> &'static str {
        self.0.name()
    }
    fn display_name(&self) -> &'static str {
        self.0.display_name()
    }
    fn capabilities(&self) -> LlmCapabilities {
        self.0.capabilities()
    }
    fn default_model(&self) -> &str {
        self.0.default_model()
    }
    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponseWithTools, AppError> {
        self.0.complete_with_tools(request, tools).await
    }
    async fn health_check(&self) -> Result<bool, AppError> {
        self.0.health_check().await
    }
}

async fn mock_tool_server(result_text: &str) -> mockito::ServerGuard {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/mcp")
        .match_body(mockito::Matcher::PartialJson(json!({"method": "initialize"})))
        .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": {}}).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/mcp")
        .match_body(mockito::Matcher::PartialJson(json!({"method": "tools/call"})))
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {"content": [{"type": "text", "text": result_text}]}
            })
            .to_string(),
        )
        .expect_at_least(1)
        .create_async()
        .await;
    server
}

fn orchestrator_with_server(
    script: Vec<Step>,
    server: &mockito::ServerGuard,
) -> (Orchestrator, &'static ScriptedProvider) {
    let provider: &'static ScriptedProvider = Box::leak(Box::new(ScriptedProvider::new(script)));
    let url = Url::parse(&format!("{}/mcp", server.url())).unwrap();
    let mcp = McpClient::new(url).unwrap();
    let orchestrator = Orchestrator::new(
        Box::new(ProviderRef(provider)),
        mcp,
        OrchestratorSettings::default(),
    );
    (orchestrator, provider)
}

#[tokio::test]
async fn plain_text_reply_passes_through() {
    let (orchestrator, provider) =
        orchestrator_without_server(vec![Step::Text("We stock 24\" and 27\" monitors.")]);
    let mut session = ConversationSession::new();

    let reply = orchestrator
        .submit_user_turn(&mut session, "what monitors do you have?")
        .await;

    assert_eq!(reply.text, "We stock 24\" and 27\" monitors.");
    assert!(reply.tool_outcomes.is_empty());
    assert_eq!(provider.calls_made(), 1);

    // Both sides of the turn are recorded
    assert_eq!(session.turns().len(), 2);
    assert_eq!(session.turns()[0].content, "what monitors do you have?");
    assert_eq!(session.turns()[1].content, reply.text);
}

#[tokio::test]
async fn verification_flows_into_next_round_context() {
    let server =
        mock_tool_server("Verification successful!\nCustomer ID: 42, Name: Dana Reyes").await;
    let (orchestrator, provider) = orchestrator_with_server(
        vec![
            Step::Calls(vec![FunctionCall {
                name: "verify_customer_pin".into(),
                args: json!({"email": "dana@example.com", "pin": "1234"}),
            }]),
            Step::Text("You're verified, Dana. Ready to order?"),
        ],
        &server,
    );
    let mut session = ConversationSession::new();

    let reply = orchestrator
        .submit_user_turn(&mut session, "verify me, dana@example.com pin 1234")
        .await;

    assert_eq!(reply.text, "You're verified, Dana. Ready to order?");
    assert!(session.verification().is_verified());
    assert_eq!(reply.tool_outcomes.len(), 1);
    assert_eq!(reply.tool_outcomes[0].tool_name, "verify_customer_pin");
    assert_eq!(reply.tool_outcomes[0].round, 1);

    // Second dispatch must carry the verified context and the fed-back result
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1];
    let system = &second.messages[0];
    assert_eq!(system.role, MessageRole::System);
    assert!(system.content.contains("VERIFIED CUSTOMER CONTEXT"));
    assert!(system.content.contains("Customer ID: 42, Name: Dana Reyes"));
    let fed_back = second.messages.last().unwrap();
    assert!(fed_back
        .content
        .starts_with("[Tool Result for verify_customer_pin]:"));

    // First dispatch had no context block yet
    assert!(!requests[0].messages[0]
        .content
        .contains("VERIFIED CUSTOMER CONTEXT"));
}

#[tokio::test]
async fn failed_verification_does_not_verify() {
    let server = mock_tool_server("Error: Invalid email or PIN").await;
    let (orchestrator, _provider) = orchestrator_with_server(
        vec![
            Step::Calls(vec![FunctionCall {
                name: "verify_customer_pin".into(),
                args: json!({"email": "dana@example.com", "pin": "0000"}),
            }]),
            Step::Text("That PIN didn't match, sorry."),
        ],
        &server,
    );
    let mut session = ConversationSession::new();

    orchestrator
        .submit_user_turn(&mut session, "verify me")
        .await;

    assert!(!session.verification().is_verified());
}

#[tokio::test]
async fn round_cap_stops_the_loop_with_apology() {
    let server = mock_tool_server("47 products found").await;
    let always_calling = (0..5)
        .map(|_| {
            Step::Calls(vec![FunctionCall {
                name: "list_products".into(),
                args: json!({}),
            }])
        })
        .collect();
    let (orchestrator, provider) = orchestrator_with_server(always_calling, &server);
    let mut session = ConversationSession::new();

    let reply = orchestrator
        .submit_user_turn(&mut session, "keep listing forever")
        .await;

    // Exactly five dispatches, never a sixth, and the fixed apology
    assert_eq!(provider.calls_made(), 5);
    assert_eq!(reply.text, messages::EMPTY_RESPONSE);
    assert_eq!(reply.tool_outcomes.len(), 5);
    assert_eq!(reply.tool_outcomes.last().unwrap().round, 5);
}

#[tokio::test]
async fn round_cap_keeps_the_models_last_text() {
    let server = mock_tool_server("47 products found").await;
    let narrating = (1..=5)
        .map(|round| {
            Step::TextAndCalls(
                format!("Checking the catalog, round {round}..."),
                vec![FunctionCall {
                    name: "list_products".into(),
                    args: json!({}),
                }],
            )
        })
        .collect();
    let (orchestrator, provider) = orchestrator_with_server(narrating, &server);
    let mut session = ConversationSession::new();

    let reply = orchestrator
        .submit_user_turn(&mut session, "keep listing forever")
        .await;

    // The cap still holds, but the model's final narration is the reply,
    // not the apology.
    assert_eq!(provider.calls_made(), 5);
    assert_eq!(reply.text, "Checking the catalog, round 5...");
    assert_eq!(session.turns().last().unwrap().content, reply.text);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_backoff_is_exponential_then_advisory() {
    let (orchestrator, provider) = orchestrator_without_server(vec![
        Step::RateLimited,
        Step::RateLimited,
        Step::RateLimited,
    ]);
    let mut session = ConversationSession::new();

    let started = tokio::time::Instant::now();
    let reply = orchestrator.submit_user_turn(&mut session, "hello").await;
    let waited = started.elapsed();

    // 1s after the first failure, 2s after the second, none after the last
    assert_eq!(provider.calls_made(), 3);
    assert_eq!(waited, std::time::Duration::from_secs(3));
    assert_eq!(reply.text, messages::RATE_LIMIT);
    // The advisory is recorded like any other reply
    assert_eq!(session.turns().last().unwrap().content, messages::RATE_LIMIT);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_use_flat_waits() {
    let (orchestrator, provider) =
        orchestrator_without_server(vec![Step::Flaky, Step::Flaky, Step::Flaky]);
    let mut session = ConversationSession::new();

    let started = tokio::time::Instant::now();
    let reply = orchestrator.submit_user_turn(&mut session, "hello").await;
    let waited = started.elapsed();

    assert_eq!(provider.calls_made(), 3);
    assert_eq!(waited, std::time::Duration::from_secs(2));
    assert!(reply.text.starts_with(messages::GENERIC_ERROR));
    assert!(reply.text.contains("upstream hiccup"));
}

#[tokio::test]
async fn config_error_fails_fast_without_retry() {
    let (orchestrator, provider) = orchestrator_without_server(vec![Step::ConfigError]);
    let mut session = ConversationSession::new();

    let reply = orchestrator.submit_user_turn(&mut session, "hello").await;

    assert_eq!(provider.calls_made(), 1);
    assert!(reply.text.starts_with(messages::CONFIG_ERROR));
    assert!(reply.text.contains("bad API key"));
}

#[tokio::test]
async fn transient_failure_then_success_recovers() {
    let (orchestrator, provider) = orchestrator_without_server(vec![
        Step::Flaky,
        Step::Text("Back on track."),
    ]);
    let mut session = ConversationSession::new();

    let reply = orchestrator.submit_user_turn(&mut session, "hello").await;

    assert_eq!(provider.calls_made(), 2);
    assert_eq!(reply.text, "Back on track.");
}

#[tokio::test]
async fn history_window_limits_model_context() {
    let mut script: Vec<Step> = (0..8).map(|_| Step::Text("noted")).collect();
    script.push(Step::Text("final"));
    let (orchestrator, provider) = orchestrator_without_server(script);
    let mut session = ConversationSession::new();

    for i in 0..9 {
        orchestrator
            .submit_user_turn(&mut session, &format!("message {i}"))
            .await;
    }

    let last_request = provider.requests().pop().unwrap();
    // System prompt plus at most six history turns
    assert_eq!(last_request.messages.len(), 7);
    assert_eq!(last_request.messages[0].role, MessageRole::System);
    // The newest user message is the last history entry in the window
    assert_eq!(last_request.messages.last().unwrap().content, "message 8");
}
