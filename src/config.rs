// ABOUTME: Environment-driven runtime configuration for the conversation core
// ABOUTME: Resolves tool server endpoint, LLM provider selection and orchestration knobs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # Configuration
//!
//! Environment-only configuration. Provider API keys are read by the
//! individual adapters (`GEMINI_API_KEY`, `LOCAL_LLM_API_KEY`); this module
//! covers everything else.
//!
//! | Variable | Default | Purpose |
//! |---|---|---|
//! | `TECHDESK_MCP_SERVER_URL` | `http://localhost:8000/mcp` | Tool server endpoint |
//! | `TECHDESK_LLM_PROVIDER` | `gemini` | `gemini` or `local` (OpenAI-compatible) |
//! | `TECHDESK_LLM_MODEL` | provider default | Model override |
//! | `TECHDESK_MAX_RETRIES` | `3` | Provider-call attempts per dispatch |
//! | `TECHDESK_TOOL_APPENDIX` | unset (off) | Append a "Tools used" footer to replies |

use std::env;
use std::fmt;

use url::Url;

use crate::constants::limits;
use crate::errors::{AppError, AppResult};

/// Environment variable naming the tool server endpoint
const MCP_SERVER_URL_ENV: &str = "TECHDESK_MCP_SERVER_URL";

/// Environment variable selecting the LLM provider
const LLM_PROVIDER_ENV: &str = "TECHDESK_LLM_PROVIDER";

/// Environment variable overriding the model name
const LLM_MODEL_ENV: &str = "TECHDESK_LLM_MODEL";

/// Environment variable overriding the retry budget
const MAX_RETRIES_ENV: &str = "TECHDESK_MAX_RETRIES";

/// Environment variable enabling the tool-usage appendix
const TOOL_APPENDIX_ENV: &str = "TECHDESK_TOOL_APPENDIX";

/// Default tool server endpoint for local development
const DEFAULT_SERVER_URL: &str = "http://localhost:8000/mcp";

/// Which LLM provider backs the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProviderKind {
    /// Google Gemini (requires `GEMINI_API_KEY`)
    #[default]
    Gemini,
    /// OpenAI-compatible endpoint such as Ollama, vLLM or Groq
    OpenAiCompatible,
}

impl LlmProviderKind {
    /// Resolve the provider kind from `TECHDESK_LLM_PROVIDER`
    ///
    /// Unrecognized values fall back to Gemini.
    #[must_use]
    pub fn from_env() -> Self {
        env::var(LLM_PROVIDER_ENV)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    /// Parse a provider name, case-insensitively
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "local" | "openai" | "openai-compatible" | "ollama" | "groq" | "vllm" => {
                Self::OpenAiCompatible
            }
            _ => Self::Gemini,
        }
    }
}

impl fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAiCompatible => write!(f, "openai-compatible"),
        }
    }
}

/// Runtime configuration resolved from the environment
#[derive(Debug, Clone)]
pub struct TechDeskConfig {
    /// Tool server endpoint (single JSON-RPC URL)
    pub server_url: Url,
    /// Selected LLM provider
    pub provider: LlmProviderKind,
    /// Model override, if any
    pub model: Option<String>,
    /// Provider-call attempts per dispatch
    pub max_retries: u32,
    /// Whether to append the "Tools used" footer to assistant replies
    pub show_tool_appendix: bool,
}

impl TechDeskConfig {
    /// Load configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns a config error if `TECHDESK_MCP_SERVER_URL` is set but not a
    /// valid URL, or if `TECHDESK_MAX_RETRIES` is not a positive integer.
    pub fn from_env() -> AppResult<Self> {
        let raw_url =
            env::var(MCP_SERVER_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_owned());
        let server_url = Url::parse(&raw_url).map_err(|e| {
            AppError::config(format!("{MCP_SERVER_URL_ENV} is not a valid URL: {e}"))
        })?;

        let max_retries = match env::var(MAX_RETRIES_ENV) {
            Ok(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                AppError::config(format!("{MAX_RETRIES_ENV} must be a positive integer"))
            })?,
            Err(_) => limits::DEFAULT_MAX_RETRIES,
        };

        Ok(Self {
            server_url,
            provider: LlmProviderKind::from_env(),
            model: env::var(LLM_MODEL_ENV).ok().filter(|m| !m.is_empty()),
            max_retries,
            show_tool_appendix: env::var(TOOL_APPENDIX_ENV)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!(LlmProviderKind::parse("gemini"), LlmProviderKind::Gemini);
        assert_eq!(LlmProviderKind::parse("GEMINI"), LlmProviderKind::Gemini);
        assert_eq!(
            LlmProviderKind::parse("local"),
            LlmProviderKind::OpenAiCompatible
        );
        assert_eq!(
            LlmProviderKind::parse("ollama"),
            LlmProviderKind::OpenAiCompatible
        );
        // Unknown values fall back to the default provider
        assert_eq!(LlmProviderKind::parse("mystery"), LlmProviderKind::Gemini);
    }

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(LlmProviderKind::Gemini.to_string(), "gemini");
        assert_eq!(
            LlmProviderKind::OpenAiCompatible.to_string(),
            "openai-compatible"
        );
    }
}
