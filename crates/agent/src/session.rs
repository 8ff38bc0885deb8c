//! Conversation session state
//!
//! Owned by the controller for one turn at a time; the server stores a copy
//! between requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use finassist_core::{DialogState, SlotId, TransactionRecord, Transcript};

/// One user's in-progress transfer conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    pub transcript: Transcript,
    pub record: TransactionRecord,
    pub state: DialogState,
    /// Field the last assistant reply asked for
    pub pending_field: Option<SlotId>,
    /// Remarks are asked for at most once before the summary
    pub remarks_solicited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            transcript: Transcript::new(),
            record: TransactionRecord::new(),
            state: DialogState::default(),
            pending_field: None,
            remarks_solicited: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move to `target`, ignoring transitions the state machine forbids
    pub(crate) fn transition(&mut self, target: DialogState) -> bool {
        if self.state == target {
            return true;
        }
        if !self.state.can_transition_to(target) {
            tracing::warn!(
                session_id = %self.id,
                from = %self.state,
                to = %target,
                "Rejected dialog state transition"
            );
            return false;
        }
        tracing::debug!(session_id = %self.id, from = %self.state, to = %target, "Dialog state changed");
        self.state = target;
        true
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session() {
        let session = ConversationSession::new();
        assert_eq!(session.state, DialogState::Collecting);
        assert!(session.is_active());
        assert!(session.transcript.is_empty());
        assert_eq!(session.record, TransactionRecord::new());
        assert!(Uuid::parse_str(&session.id).is_ok());
        assert_ne!(session.id, ConversationSession::new().id);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut session = ConversationSession::with_id("s1");
        assert!(session.transition(DialogState::AwaitingConfirmation));
        assert!(session.transition(DialogState::Cancelled));
        assert!(!session.is_active());
        assert!(!session.transition(DialogState::Collecting));
        assert_eq!(session.state, DialogState::Cancelled);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut session = ConversationSession::with_id("s2");
        session.transcript.push_user("send 500 to Ravi");
        session.pending_field = Some(SlotId::Amount);

        let json = serde_json::to_string(&session).unwrap();
        let restored: ConversationSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }
}
