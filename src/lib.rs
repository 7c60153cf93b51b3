// ABOUTME: TechDesk library root wiring together transport, catalog, LLM and orchestration modules
// ABOUTME: Exposes the conversation core consumed by the terminal presentation layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # TechDesk
//!
//! Conversation core for the TechSupport Pro customer assistant. A human asks
//! natural-language questions about the product catalog and their own orders;
//! an LLM decides when to invoke remote operations (product lookup, customer
//! verification, order history, order placement) exposed by an MCP-style
//! JSON-RPC server.
//!
//! The crate is the bridge between the model's structured function-call
//! requests and the remote tool server:
//!
//! - [`mcp::McpClient`] — JSON-RPC 2.0 transport with a lazy `initialize`
//!   handshake and monotonic request ids
//! - [`catalog`] — the single source of truth for the eight callable
//!   operations, exported into each provider's schema dialect
//! - [`bridge`] — sequential tool execution and the customer-verification
//!   side-effect detection
//! - [`orchestrator`] — the per-turn loop: dispatch, execute requested tools,
//!   feed results back, repeat until the model answers in plain text
//! - [`session`] — per-conversation history and verification state, owned by
//!   the presentation layer and threaded through every call
//!
//! The presentation layer (a terminal REPL in `src/bin/techdesk.rs`) holds a
//! [`session::ConversationSession`] and calls
//! [`orchestrator::Orchestrator::submit_user_turn`] once per user message.

/// Tool invocation bridge between model function calls and the MCP transport
pub mod bridge;
/// Canonical tool catalog and provider schema exports
pub mod catalog;
/// Environment-driven runtime configuration
pub mod config;
/// Fixed protocol constants and user-facing advisory strings
pub mod constants;
/// Unified error handling with error codes
pub mod errors;
/// JSON-RPC 2.0 request/response envelope
pub mod jsonrpc;
/// LLM provider abstraction (Gemini and OpenAI-compatible adapters)
pub mod llm;
/// Structured logging configuration
pub mod logging;
/// MCP transport client
pub mod mcp;
/// Per-turn conversation orchestration loop
pub mod orchestrator;
/// Conversation history and verification state
pub mod session;
