// ABOUTME: Per-conversation state: turn history, verification status and atomic reset
// ABOUTME: Owned by the presentation layer and threaded through every orchestrator call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 TechDesk Contributors

//! # Conversation Session
//!
//! Explicit session state for one conversation: the full turn history (only
//! a trailing window of which is sent to the model) and the customer
//! verification flag with its raw record. Verification is sticky for the
//! lifetime of the session; the only way to clear it is [`ConversationSession::reset`],
//! which atomically drops history and verification together so a reset can
//! never leave a verified flag with no history behind it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::limits;

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The human customer
    User,
    /// The assistant's final reply for a turn
    Assistant,
}

/// One entry in the conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who spoke
    pub role: TurnRole,
    /// What they said
    pub content: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Customer verification status for a session
///
/// Starts unverified. A successful `verify_customer_pin` call flips it to
/// verified and stores the raw customer record for prompt injection. There
/// is deliberately no `clear` short of a full session reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationState {
    verified: bool,
    customer_record: Option<String>,
}

impl VerificationState {
    /// Whether the customer has verified their identity this session
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.verified
    }

    /// The raw customer record captured at verification time, if verified
    #[must_use]
    pub fn customer_record(&self) -> Option<&str> {
        self.customer_record.as_deref()
    }

    /// Record a successful verification with the server's raw response
    pub fn mark_verified(&mut self, customer_record: impl Into<String>) {
        self.verified = true;
        self.customer_record = Some(customer_record.into());
    }
}

/// State for one conversation with one customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Session identifier, for log correlation
    pub id: Uuid,
    /// When the session (or its latest reset) started
    pub started_at: DateTime<Utc>,
    turns: Vec<ConversationTurn>,
    verification: VerificationState,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    /// Start a fresh session
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            turns: Vec::new(),
            verification: VerificationState::default(),
        }
    }

    /// Record a user turn
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn::new(TurnRole::User, content));
    }

    /// Record the assistant's final reply for a turn
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns
            .push(ConversationTurn::new(TurnRole::Assistant, content));
    }

    /// Full history, oldest first
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The trailing window of turns sent to the model as context
    #[must_use]
    pub fn recent_turns(&self) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(limits::HISTORY_WINDOW);
        &self.turns[start..]
    }

    /// Verification state, read by the prompt builder and the status display
    #[must_use]
    pub const fn verification(&self) -> &VerificationState {
        &self.verification
    }

    /// Mutable verification state, written by the tool bridge
    pub fn verification_mut(&mut self) -> &mut VerificationState {
        &mut self.verification
    }

    /// Atomically drop history and verification, keeping the session id
    ///
    /// After a reset the session behaves exactly like a new one: empty
    /// history and an unverified customer.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.verification = VerificationState::default();
        self.started_at = Utc::now();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_turns_window() {
        let mut session = ConversationSession::new();
        for i in 0..10 {
            session.push_user(format!("question {i}"));
        }
        assert_eq!(session.turns().len(), 10);
        let recent = session.recent_turns();
        assert_eq!(recent.len(), limits::HISTORY_WINDOW);
        assert_eq!(recent[0].content, "question 4");
        assert_eq!(recent.last().unwrap().content, "question 9");
    }

    #[test]
    fn test_recent_turns_short_history() {
        let mut session = ConversationSession::new();
        session.push_user("hello");
        session.push_assistant("hi there");
        assert_eq!(session.recent_turns().len(), 2);
    }

    #[test]
    fn test_verification_survives_more_turns() {
        let mut session = ConversationSession::new();
        session
            .verification_mut()
            .mark_verified("Customer ID: 7, Name: Kim");
        for _ in 0..20 {
            session.push_user("more");
            session.push_assistant("noted");
        }
        assert!(session.verification().is_verified());
        assert_eq!(
            session.verification().customer_record(),
            Some("Customer ID: 7, Name: Kim")
        );
    }

    #[test]
    fn test_reset_clears_history_and_verification_together() {
        let mut session = ConversationSession::new();
        session.push_user("verify me");
        session.verification_mut().mark_verified("Customer ID: 7");
        let id = session.id;

        session.reset();

        assert!(session.turns().is_empty());
        assert!(!session.verification().is_verified());
        assert!(session.verification().customer_record().is_none());
        assert_eq!(session.id, id);
    }
}
