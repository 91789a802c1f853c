//! Conversation history with tool-call bookkeeping.
//!
//! The history is an ordered list of turns. Every tool invocation an
//! assistant turn emits stays "pending" until a later turn answers it, and
//! nothing else may be appended while invocations are pending.

use std::collections::HashSet;

use crate::error::HistoryError;
use crate::types::{Role, Turn};

#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    /// Unanswered invocation ids, in emission order
    pending: Vec<String>,
    /// Every invocation id seen so far
    seen: HashSet<String>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, enforcing the tool-call pairing rules.
    pub fn push(&mut self, turn: Turn) -> Result<(), HistoryError> {
        if turn.role == Role::System {
            return Err(HistoryError::SystemTurn);
        }

        let answered = turn.answered_ids();
        if answered.is_empty() {
            if !self.pending.is_empty() {
                return Err(HistoryError::UnansweredToolCalls(self.pending.len()));
            }
        } else {
            for id in &answered {
                if !self.pending.iter().any(|p| p == id) {
                    return Err(HistoryError::UnknownToolResult(id.to_string()));
                }
            }
        }

        let mut fresh = HashSet::new();
        for id in turn.invocation_ids() {
            if self.seen.contains(id) || !fresh.insert(id) {
                return Err(HistoryError::DuplicateToolCallId(id.to_string()));
            }
        }

        // Validation done, now mutate.
        self.pending
            .retain(|p| !answered.iter().any(|a| *a == p.as_str()));
        for id in turn.invocation_ids() {
            self.pending.push(id.to_string());
            self.seen.insert(id.to_string());
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Invocation ids still waiting for a result, in emission order.
    pub fn pending_ids(&self) -> &[String] {
        &self.pending
    }

    /// True when no tool invocation is waiting for a result.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every turn from `len` onward and rebuild the bookkeeping.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.turns.len() {
            return;
        }
        let kept: Vec<Turn> = self.turns.drain(..len).collect();
        self.clear();
        for turn in kept {
            // These turns were accepted once already, replaying them cannot fail.
            let _ = self.push(turn);
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.pending.clear();
        self.seen.clear();
    }
}
