// ABOUTME: System prompts for LLM interactions loaded at compile time
// ABOUTME: Builds the TechSupport Pro agent prompt, injecting verified customer context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # System Prompts
//!
//! The base prompt is loaded at compile time from a markdown file for easy
//! maintenance. Every turn rebuilds the prompt from the session's
//! verification state: once a customer is verified, their raw record is
//! injected into a `VERIFIED CUSTOMER CONTEXT` block so the model can place
//! orders without re-asking for identity.

use crate::session::VerificationState;

/// TechSupport Pro support agent base prompt
///
/// Contains the agent's role, tool-usage guidance and the product category
/// overview. The `{customer_context}` slot is filled per turn.
const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("techdesk_system.md");

/// Placeholder replaced with the verification block (or nothing)
const CUSTOMER_CONTEXT_SLOT: &str = "{customer_context}";

/// Build the per-turn system prompt from the session's verification state
///
/// Unverified sessions get the base prompt with an empty context slot.
#[must_use]
pub fn build_system_prompt(verification: &VerificationState) -> String {
    let customer_context = verification.customer_record().map_or_else(String::new, |record| {
        format!(
            "VERIFIED CUSTOMER CONTEXT:\n{record}\nThe customer has been verified and can place orders."
        )
    });
    SYSTEM_PROMPT_TEMPLATE.replace(CUSTOMER_CONTEXT_SLOT, &customer_context)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_unverified_prompt_has_no_context_block() {
        let prompt = build_system_prompt(&VerificationState::default());
        assert!(prompt.contains("TechSupport Pro"));
        assert!(!prompt.contains("VERIFIED CUSTOMER CONTEXT"));
        assert!(!prompt.contains(CUSTOMER_CONTEXT_SLOT));
    }

    #[test]
    fn test_verified_prompt_injects_customer_record() {
        let mut verification = VerificationState::default();
        verification.mark_verified("Customer ID: 42, Name: Dana Reyes");
        let prompt = build_system_prompt(&verification);
        assert!(prompt.contains("VERIFIED CUSTOMER CONTEXT"));
        assert!(prompt.contains("Customer ID: 42, Name: Dana Reyes"));
        assert!(prompt.contains("can place orders"));
    }
}
