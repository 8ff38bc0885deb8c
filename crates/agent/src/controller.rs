//! Slot-filling session controller
//!
//! Drives one conversation through
//! `Collecting -> AwaitingConfirmation -> Completed | Cancelled`.
//!
//! Each user turn is either an explicit command (`complete`, `cancel`,
//! `change <field>`, or declining remarks when they were just asked for)
//! or free text handed to the [`SlotExtractor`]. Extracted values are
//! validated and merged with last-write-wins semantics, then the first
//! missing required field decides the next question.

use chrono::Utc;
use std::sync::Arc;

use finassist_config::Settings;
use finassist_core::{
    DialogState, Error, Result, SlotId, TransferLimits, TransferRequest, ValidationError,
    NO_REMARKS,
};

use crate::extractor::SlotExtractor;
use crate::prompts::{
    confirmation_summary, field_prompt, CANCELLED_MESSAGE, COMPLETED_MESSAGE, GREETING,
    UNKNOWN_CHANGE_MESSAGE,
};
use crate::session::ConversationSession;

/// Explicit user command, matched against the whole trimmed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Complete,
    Cancel,
    Change(SlotId),
    /// `change <alias>` with an alias that names no field
    UnknownChange(String),
    /// Declining the remarks question
    Decline,
}

impl Command {
    pub fn parse(message: &str) -> Option<Command> {
        let text = message.trim().to_lowercase();
        match text.as_str() {
            "complete" | "confirm" => return Some(Command::Complete),
            "cancel" | "exit" | "quit" | "stop" => return Some(Command::Cancel),
            "no" | "none" | "no remarks" | "nil" | "skip" => return Some(Command::Decline),
            _ => {}
        }

        let alias = text.strip_prefix("change ")?.trim();
        Some(match SlotId::from_alias(alias) {
            Some(slot) => Command::Change(slot),
            None => Command::UnknownChange(alias.to_string()),
        })
    }
}

/// What one turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub state: DialogState,
    /// Final request, only when the turn completed the transfer
    pub payload: Option<TransferRequest>,
    /// Extracted values rejected by validation this turn
    pub errors: Vec<ValidationError>,
}

impl TurnOutcome {
    fn new(reply: impl Into<String>, state: DialogState) -> Self {
        Self {
            reply: reply.into(),
            state,
            payload: None,
            errors: Vec::new(),
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Required slots in the order they are asked for
    pub required: Vec<SlotId>,
    pub limits: TransferLimits,
    /// Source account for the payload when none was collected
    pub default_from_account: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            required: SlotId::required(true),
            limits: TransferLimits::default(),
            default_from_account: None,
        }
    }
}

impl ControllerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            required: SlotId::required(settings.conversation.require_from_account),
            limits: settings.transfer.limits(),
            default_from_account: settings.conversation.default_from_account.clone(),
        }
    }
}

pub struct SlotFillingController {
    extractor: Arc<dyn SlotExtractor>,
    config: ControllerConfig,
}

impl SlotFillingController {
    pub fn new(extractor: Arc<dyn SlotExtractor>, config: ControllerConfig) -> Self {
        Self { extractor, config }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Open a session and return it with the opening prompt
    pub fn start(&self) -> (ConversationSession, String) {
        let mut session = ConversationSession::new();
        let first = self.config.required.first().copied();

        let prompt = match first {
            Some(slot) => format!("{} {}", GREETING, field_prompt(slot)),
            None => GREETING.to_string(),
        };
        session.pending_field = first;
        session.transcript.push_assistant(prompt.clone());

        tracing::info!(session_id = %session.id, "Conversation started");
        (session, prompt)
    }

    /// Missing required slots, in asking order
    pub fn missing_fields(&self, session: &ConversationSession) -> Vec<SlotId> {
        session.record.missing(&self.config.required)
    }

    /// Handle one user message.
    ///
    /// Fails without touching the session when it is already terminal, the
    /// message is blank, or `complete` is sent before every required field
    /// is present.
    pub async fn handle_message(
        &self,
        session: &mut ConversationSession,
        message: &str,
    ) -> Result<TurnOutcome> {
        if !session.is_active() {
            return Err(Error::NoActiveSession(session.id.clone()));
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("message must not be empty".to_string()));
        }

        metrics::counter!("finassist_turns_total").increment(1);
        tracing::debug!(session_id = %session.id, state = %session.state, text = %message, "User turn");

        let outcome = match Command::parse(message) {
            Some(Command::Complete) => self.complete(session)?,
            Some(Command::Cancel) => self.cancel(session)?,
            Some(Command::Change(slot)) => self.change(session, slot),
            Some(Command::UnknownChange(alias)) => {
                tracing::debug!(session_id = %session.id, alias = %alias, "Unknown change target");
                TurnOutcome::new(UNKNOWN_CHANGE_MESSAGE, session.state)
            }
            Some(Command::Decline) if session.pending_field == Some(SlotId::Remarks) => {
                session.record.remarks = Some(NO_REMARKS.to_string());
                self.evaluate(session, Vec::new())
            }
            _ => self.extract_and_merge(session, message).await,
        };

        session.transcript.push_user(message);
        session.transcript.push_assistant(outcome.reply.clone());
        session.touch();
        Ok(outcome)
    }

    /// Finalize the transfer
    pub fn complete(&self, session: &mut ConversationSession) -> Result<TurnOutcome> {
        if !session.is_active() {
            return Err(Error::NoActiveSession(session.id.clone()));
        }

        let missing = self.missing_fields(session);
        if !missing.is_empty() {
            tracing::info!(session_id = %session.id, missing = ?missing, "Completion rejected");
            return Err(Error::IncompleteRecord { missing });
        }

        let payload = TransferRequest::from_record(
            &session.record,
            self.config.default_from_account.as_deref(),
            Utc::now(),
        )?;

        session.transition(DialogState::Completed);
        session.pending_field = None;
        session.touch();
        metrics::counter!("finassist_transfers_completed_total").increment(1);
        tracing::info!(
            session_id = %session.id,
            method = %session.record.transaction_type,
            "Transfer request completed"
        );

        let mut outcome = TurnOutcome::new(COMPLETED_MESSAGE, DialogState::Completed);
        outcome.payload = Some(payload);
        Ok(outcome)
    }

    /// Abandon the conversation and discard the record
    pub fn cancel(&self, session: &mut ConversationSession) -> Result<TurnOutcome> {
        if !session.is_active() {
            return Err(Error::NoActiveSession(session.id.clone()));
        }

        session.record = Default::default();
        session.pending_field = None;
        session.transition(DialogState::Cancelled);
        session.touch();
        metrics::counter!("finassist_sessions_cancelled_total").increment(1);
        tracing::info!(session_id = %session.id, "Conversation cancelled");

        Ok(TurnOutcome::new(CANCELLED_MESSAGE, DialogState::Cancelled))
    }

    fn change(&self, session: &mut ConversationSession, slot: SlotId) -> TurnOutcome {
        session.record.clear(slot);
        if slot == SlotId::Remarks {
            session.remarks_solicited = true;
        }
        session.pending_field = Some(slot);
        session.transition(DialogState::Collecting);
        tracing::debug!(session_id = %session.id, field = %slot, "Field cleared for edit");

        TurnOutcome::new(field_prompt(slot), session.state)
    }

    async fn extract_and_merge(&self, session: &mut ConversationSession, message: &str) -> TurnOutcome {
        let context = session.transcript.render();
        let extraction = self.extractor.extract(message, &context).await;
        let errors = session.record.merge(&extraction, &self.config.limits);

        if !errors.is_empty() {
            tracing::info!(
                session_id = %session.id,
                rejected = errors.len(),
                "Extracted values failed validation"
            );
        }
        self.evaluate(session, errors)
    }

    /// Pick the next prompt from the current record
    fn evaluate(&self, session: &mut ConversationSession, errors: Vec<ValidationError>) -> TurnOutcome {
        let missing = self.missing_fields(session);

        let (prompt, state, pending) = if let Some(&first) = missing.first() {
            (field_prompt(first).to_string(), DialogState::Collecting, Some(first))
        } else if session.record.remarks.is_none() && !session.remarks_solicited {
            session.remarks_solicited = true;
            (
                field_prompt(SlotId::Remarks).to_string(),
                DialogState::AwaitingConfirmation,
                Some(SlotId::Remarks),
            )
        } else {
            (
                confirmation_summary(&session.record),
                DialogState::AwaitingConfirmation,
                None,
            )
        };

        session.transition(state);
        session.pending_field = pending;

        let reply = if errors.is_empty() {
            prompt
        } else {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            format!("{}\n\n{}", messages.join("\n"), prompt)
        };

        TurnOutcome {
            reply,
            state: session.state,
            payload: None,
            errors,
        }
    }
}
