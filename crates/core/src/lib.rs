//! Core types for the FinAssist transfer assistant
//!
//! This crate provides the domain model shared by every other crate:
//! - Transaction slots and the partially filled transfer record
//! - Extraction results produced per user turn
//! - Field validation and account masking
//! - Conversation transcript and dialog states
//! - The final transfer request payload
//! - Error types

pub mod conversation;
pub mod error;
pub mod payload;
pub mod transaction;
pub mod validation;

pub use conversation::{DialogState, Transcript, Turn, TurnRole};
pub use error::{Error, Result};
pub use payload::{
    TransferData, TransferRequest, CONFIRMATION_PAGE_LINK, NO_REMARKS, SUCCESS_MESSAGE,
};
pub use transaction::{ExtractionResult, SlotId, TransactionRecord, TransferMethod};
pub use validation::{mask_account_number, TransferLimits, ValidationError};
