// ABOUTME: MCP transport module exposing the JSON-RPC tool server client
// ABOUTME: Handshake, tool discovery and tool invocation live in client.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # MCP Transport
//!
//! HTTP POST client for an MCP-style JSON-RPC 2.0 tool server. One endpoint,
//! three methods: `initialize`, `tools/list` and `tools/call`.

mod client;

pub use client::{McpClient, RemoteToolInfo};
