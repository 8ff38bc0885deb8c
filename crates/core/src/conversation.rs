//! Conversation types: dialog states, turns and the running transcript

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// State of one slot-filling conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    /// At least one required field is still missing
    #[default]
    Collecting,
    /// Every required field is present; waiting for complete/cancel/change
    AwaitingConfirmation,
    /// User confirmed; the final payload has been emitted
    Completed,
    /// User cancelled; the record was discarded
    Cancelled,
}

static STATE_TRANSITIONS: Lazy<HashMap<DialogState, &'static [DialogState]>> = Lazy::new(|| {
    use DialogState::*;
    let mut map = HashMap::new();
    map.insert(
        Collecting,
        &[AwaitingConfirmation, Completed, Cancelled] as &[_],
    );
    map.insert(
        AwaitingConfirmation,
        &[Collecting, Completed, Cancelled] as &[_],
    );
    map.insert(Completed, &[] as &[_]);
    map.insert(Cancelled, &[] as &[_]);
    map
});

impl DialogState {
    /// States reachable from this one
    pub fn allowed_transitions(&self) -> &'static [DialogState] {
        STATE_TRANSITIONS.get(self).copied().unwrap_or(&[])
    }

    /// Check if a transition to `target` is allowed
    pub fn can_transition_to(&self, target: DialogState) -> bool {
        self == &target || self.allowed_transitions().contains(&target)
    }

    /// Completed and Cancelled end the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, DialogState::Completed | DialogState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DialogState::Collecting => "collecting",
            DialogState::AwaitingConfirmation => "awaiting_confirmation",
            DialogState::Completed => "completed",
            DialogState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DialogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role in a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// End-user message
    User,
    /// Assistant reply
    Assistant,
    /// System message (greeting, instructions)
    System,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::System => "system",
        }
    }

    /// Speaker label used when the transcript is rendered for the LLM
    pub fn label(&self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
            TurnRole::System => "System",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Role of the speaker
    pub role: TurnRole,
    /// Content of the turn
    pub content: String,
    /// When the turn occurred
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a new turn
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    /// Create a system turn
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(TurnRole::System, content)
    }
}

/// Append-only, role-tagged transcript.
///
/// Rendered verbatim into the extraction prompt on every turn; growth is
/// unbounded for the lifetime of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Turn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Turn::assistant(content));
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

    /// Number of user turns so far
    pub fn user_turn_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.role == TurnRole::User)
            .count()
    }

    /// Render as `Speaker: text` lines, oldest first
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            out.push_str(turn.role.label());
            out.push_str(": ");
            out.push_str(&turn.content);
            out.push('\n');
        }
        out
    }
}
