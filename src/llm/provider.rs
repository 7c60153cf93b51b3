// ABOUTME: Provider selection factory resolving the configured LLM backend
// ABOUTME: Wraps the concrete adapters in one enum the orchestrator can own
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # Provider Factory
//!
//! [`ChatProvider`] is the concrete provider the binary constructs from
//! configuration. It delegates every [`LlmProvider`] method to the wrapped
//! adapter, so the orchestrator works with either backend (or, in tests, any
//! other `LlmProvider` implementation) without caring which.

use async_trait::async_trait;

use super::{
    ChatRequest, ChatResponseWithTools, GeminiProvider, LlmCapabilities, LlmProvider,
    OpenAiCompatibleProvider, Tool,
};
use crate::config::LlmProviderKind;
use crate::errors::AppError;

/// The configured LLM backend
#[derive(Debug)]
pub enum ChatProvider {
    /// Google Gemini
    Gemini(GeminiProvider),
    /// Any OpenAI-compatible endpoint
    OpenAiCompatible(OpenAiCompatibleProvider),
}

impl ChatProvider {
    /// Construct the provider selected by the environment
    ///
    /// # Errors
    ///
    /// Returns a config error if the selected provider cannot be constructed,
    /// for example when `GEMINI_API_KEY` is missing.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_kind(LlmProviderKind::from_env())
    }

    /// Construct a provider of the given kind from the environment
    ///
    /// # Errors
    ///
    /// Returns a config error if the provider cannot be constructed.
    pub fn from_kind(kind: LlmProviderKind) -> Result<Self, AppError> {
        match kind {
            LlmProviderKind::Gemini => Ok(Self::Gemini(GeminiProvider::from_env()?)),
            LlmProviderKind::OpenAiCompatible => Ok(Self::OpenAiCompatible(
                OpenAiCompatibleProvider::from_env()?,
            )),
        }
    }

    fn inner(&self) -> &dyn LlmProvider {
        match self {
            Self::Gemini(provider) => provider,
            Self::OpenAiCompatible(provider) => provider,
        }
    }
}

#[async_trait]
impl LlmProvider for ChatProvider {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn display_name(&self) -> &'static str {
        self.inner().display_name()
    }

    fn capabilities(&self) -> LlmCapabilities {
        self.inner().capabilities()
    }

    fn default_model(&self) -> &str {
        self.inner().default_model()
    }

    async fn complete_with_tools(
        &self,
        request: &ChatRequest,
        tools: Option<Vec<Tool>>,
    ) -> Result<ChatResponseWithTools, AppError> {
        self.inner().complete_with_tools(request, tools).await
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        self.inner().health_check().await
    }
}
