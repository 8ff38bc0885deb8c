//! Field validation and account masking

use crate::transaction::SlotId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static IFSC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{4}[0-9]{7}$").expect("valid IFSC regex"));

const ACCOUNT_MIN_LEN: usize = 9;
const ACCOUNT_MAX_LEN: usize = 18;
const MMID_LEN: usize = 7;

/// Per-transfer amount bounds and the simulated balance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransferLimits {
    pub min_amount: f64,
    pub max_amount: f64,
    pub account_balance: f64,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            min_amount: 100.0,
            max_amount: 25_000.0,
            account_balance: 50_000.0,
        }
    }
}

/// Field-specific rejection. The display text is shown to the user as is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Please provide a value for {}.", .0.display_name())]
    Empty(SlotId),

    #[error("That IFSC code doesn't look right. It should be 4 capital letters followed by 7 digits, for example HDFC0001234.")]
    InvalidIfsc,

    #[error("The recipient's account number should contain only digits and be 9 to 18 digits long.")]
    InvalidBeneficiaryAccount,

    #[error("Your account number should contain only digits and be 9 to 18 digits long.")]
    InvalidSourceAccount,

    #[error("Invalid amount format.")]
    InvalidAmountFormat,

    #[error("Amount must be greater than zero.")]
    NonPositiveAmount,

    #[error("Insufficient funds in your account.")]
    InsufficientFunds,

    #[error("The maximum transfer amount is ₹{}.", format_amount(.0))]
    AboveMaximum(f64),

    #[error("The minimum transfer amount is ₹{}.", format_amount(.0))]
    BelowMinimum(f64),

    #[error("The MMID should be exactly 7 digits.")]
    InvalidMmid,

    #[error("The transfer method must be IMPS, NEFT or RTGS.")]
    InvalidTransferMethod,
}

fn format_amount(value: &f64) -> String {
    let value = *value;
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// 4 uppercase letters followed by 7 digits. Case is not normalised.
pub fn is_valid_ifsc(ifsc: &str) -> bool {
    IFSC_PATTERN.is_match(ifsc)
}

/// All digits, 9 to 18 long
pub fn is_valid_account_number(account: &str) -> bool {
    (ACCOUNT_MIN_LEN..=ACCOUNT_MAX_LEN).contains(&account.len())
        && account.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_mmid(mmid: &str) -> bool {
    mmid.len() == MMID_LEN && mmid.chars().all(|c| c.is_ascii_digit())
}

/// Parse and bound-check an amount. Thousands separators are accepted.
pub fn parse_amount(raw: &str, limits: &TransferLimits) -> Result<f64, ValidationError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let amount: f64 = cleaned
        .parse()
        .map_err(|_| ValidationError::InvalidAmountFormat)?;
    if !amount.is_finite() {
        return Err(ValidationError::InvalidAmountFormat);
    }
    if amount <= 0.0 {
        return Err(ValidationError::NonPositiveAmount);
    }
    if amount > limits.account_balance {
        return Err(ValidationError::InsufficientFunds);
    }
    if amount > limits.max_amount {
        return Err(ValidationError::AboveMaximum(limits.max_amount));
    }
    if amount < limits.min_amount {
        return Err(ValidationError::BelowMinimum(limits.min_amount));
    }
    Ok(amount)
}

/// Validate a candidate slot value, returning the form to store
pub fn validate_slot(
    slot: SlotId,
    value: &str,
    limits: &TransferLimits,
) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Empty(slot));
    }

    match slot {
        SlotId::BeneficiaryIfsc if !is_valid_ifsc(value) => Err(ValidationError::InvalidIfsc),
        SlotId::BeneficiaryAccount if !is_valid_account_number(value) => {
            Err(ValidationError::InvalidBeneficiaryAccount)
        }
        SlotId::FromAccount if !is_valid_account_number(value) => {
            Err(ValidationError::InvalidSourceAccount)
        }
        SlotId::Mmid if !is_valid_mmid(value) => Err(ValidationError::InvalidMmid),
        SlotId::Amount => {
            parse_amount(value, limits)?;
            Ok(value.replace(',', ""))
        }
        _ => Ok(value.to_string()),
    }
}

/// Replace all but the last four characters with `X`
pub fn mask_account_number(account: &str) -> String {
    let chars: Vec<char> = account.chars().collect();
    let visible = chars.len().saturating_sub(4);
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < visible { 'X' } else { *c })
        .collect()
}
