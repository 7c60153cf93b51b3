// ABOUTME: Protocol constants and fixed user-facing advisory strings
// ABOUTME: Single source for strings shared between the orchestrator, transport and tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # Constants
//!
//! Named constants shared across modules. User-facing failure text lives here
//! so the orchestrator and the test suite agree on exact wording.

/// MCP protocol constants for the `initialize` handshake
pub mod protocol {
    /// Protocol version sent in the `initialize` handshake
    pub const VERSION: &str = "2024-11-05";

    /// Client name reported in `clientInfo`
    pub const CLIENT_NAME: &str = "techdesk";

    /// Client version reported in `clientInfo`
    pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Per-request timeout for the tool server, in seconds
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
}

/// Orchestration limits
pub mod limits {
    /// Maximum model-dispatch/tool-execution rounds per user turn
    pub const MAX_TOOL_ROUNDS: usize = 5;

    /// Default number of provider-call attempts before giving up
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Number of trailing conversation turns sent as model context
    pub const HISTORY_WINDOW: usize = 6;
}

/// Fixed strings embedded in tool results and verification detection
pub mod markers {
    /// Sentinel returned when a `tools/call` result carries no content
    pub const NO_CONTENT_RESULT: &str = "No content returned";

    /// Substring whose presence in a `verify_customer_pin` result proves a
    /// successful verification. The remote server's success response carries
    /// this marker; changing either side breaks authentication detection.
    pub const VERIFICATION_MARKER: &str = "Customer ID:";
}

/// Fixed user-facing messages rendered as assistant text on failure
pub mod messages {
    /// Returned after exhausting retries on provider rate limits
    pub const RATE_LIMIT: &str = "**Rate Limit Exceeded**\n\n\
        The AI service is currently experiencing high demand. Please try \
        again in a few moments.\n\n\
        *Tip: You can also try clearing the chat history to reduce token usage.*";

    /// Prefix for immediate configuration failures (underlying error appended)
    pub const CONFIG_ERROR: &str = "**Configuration Error**\n\n\
        There was an issue with the request. Please check your API key \
        configuration.";

    /// Prefix for unexpected failures after exhausting retries
    pub const GENERIC_ERROR: &str = "**Error**\n\n\
        An unexpected error occurred. Please try again.";

    /// Fallback when the model produced no text (or the round cap was hit)
    pub const EMPTY_RESPONSE: &str =
        "I apologize, but I couldn't generate a response. Please try again.";

    /// Shown when no provider API key is configured at all
    pub const MISSING_API_KEY: &str = "Please configure an API key for your \
        LLM provider (for example GEMINI_API_KEY) to use the assistant.";
}
