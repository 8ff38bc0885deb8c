//! Transaction slots, the accumulated transfer record and per-turn extraction results
//!
//! A [`TransactionRecord`] is created empty when a session starts and is
//! filled slot by slot as extraction results are merged into it. An
//! [`ExtractionResult`] carries only what one user turn contributed: a `None`
//! entry means "nothing new for this slot", never "clear it".

use crate::validation::{self, TransferLimits, ValidationError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Transfer rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferMethod {
    #[default]
    Imps,
    Neft,
    Rtgs,
}

impl TransferMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMethod::Imps => "IMPS",
            TransferMethod::Neft => "NEFT",
            TransferMethod::Rtgs => "RTGS",
        }
    }
}

impl std::fmt::Display for TransferMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imps" => Ok(TransferMethod::Imps),
            "neft" => Ok(TransferMethod::Neft),
            "rtgs" => Ok(TransferMethod::Rtgs),
            _ => Err(ValidationError::InvalidTransferMethod),
        }
    }
}

/// One named field of the transaction record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotId {
    TransactionType,
    BeneficiaryName,
    BeneficiaryAccount,
    BeneficiaryIfsc,
    BeneficiaryBank,
    Amount,
    FromAccount,
    Remarks,
    Mmid,
}

impl SlotId {
    /// Every slot, in record order
    pub const ALL: [SlotId; 9] = [
        SlotId::TransactionType,
        SlotId::BeneficiaryName,
        SlotId::BeneficiaryAccount,
        SlotId::BeneficiaryIfsc,
        SlotId::BeneficiaryBank,
        SlotId::Amount,
        SlotId::FromAccount,
        SlotId::Remarks,
        SlotId::Mmid,
    ];

    /// Slots that must be filled before the record can be confirmed, in
    /// the order they are asked for
    pub fn required(require_from_account: bool) -> Vec<SlotId> {
        let mut slots = vec![
            SlotId::BeneficiaryName,
            SlotId::BeneficiaryAccount,
            SlotId::BeneficiaryIfsc,
            SlotId::Amount,
        ];
        if require_from_account {
            slots.push(SlotId::FromAccount);
        }
        slots
    }

    /// Key used in JSON and in the extraction prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotId::TransactionType => "transaction_type",
            SlotId::BeneficiaryName => "beneficiary_name",
            SlotId::BeneficiaryAccount => "beneficiary_account",
            SlotId::BeneficiaryIfsc => "beneficiary_ifsc",
            SlotId::BeneficiaryBank => "beneficiary_bank",
            SlotId::Amount => "amount",
            SlotId::FromAccount => "from_account",
            SlotId::Remarks => "remarks",
            SlotId::Mmid => "mmid",
        }
    }

    /// Label shown to the user in the confirmation summary
    pub fn display_name(&self) -> &'static str {
        match self {
            SlotId::TransactionType => "Transaction Type",
            SlotId::BeneficiaryName => "Recipient's Name",
            SlotId::BeneficiaryAccount => "Recipient's Account",
            SlotId::BeneficiaryIfsc => "Bank IFSC Code",
            SlotId::BeneficiaryBank => "Recipient's Bank",
            SlotId::Amount => "Amount",
            SlotId::FromAccount => "Your Account",
            SlotId::Remarks => "Remarks",
            SlotId::Mmid => "MMID",
        }
    }

    /// Resolve the alias used in a `change <alias>` command.
    ///
    /// Accepts the short aliases (`name`, `account`, `ifsc`, `amount`,
    /// `remarks`) as well as the full slot keys.
    pub fn from_alias(alias: &str) -> Option<SlotId> {
        let alias = alias.trim().to_ascii_lowercase();
        match alias.as_str() {
            "name" => Some(SlotId::BeneficiaryName),
            "account" => Some(SlotId::BeneficiaryAccount),
            "ifsc" => Some(SlotId::BeneficiaryIfsc),
            "amount" => Some(SlotId::Amount),
            "remarks" => Some(SlotId::Remarks),
            other => SlotId::ALL
                .iter()
                .copied()
                .find(|s| *s != SlotId::TransactionType && s.as_str() == other),
        }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields found in one user turn. `None` means no new information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionResult {
    pub transaction_type: Option<String>,
    pub beneficiary_name: Option<String>,
    pub beneficiary_account: Option<String>,
    pub beneficiary_ifsc: Option<String>,
    pub beneficiary_bank: Option<String>,
    pub amount: Option<String>,
    pub from_account: Option<String>,
    pub remarks: Option<String>,
    pub mmid: Option<String>,
}

impl ExtractionResult {
    pub fn get(&self, slot: SlotId) -> Option<&str> {
        self.slot_ref(slot).as_deref()
    }

    pub fn set(&mut self, slot: SlotId, value: impl Into<String>) {
        *self.slot_mut(slot) = Some(value.into());
    }

    /// True when no slot carries a value
    pub fn is_empty(&self) -> bool {
        SlotId::ALL.iter().all(|s| self.get(*s).is_none())
    }

    /// Populated slots, in record order
    pub fn values(&self) -> impl Iterator<Item = (SlotId, &str)> + '_ {
        SlotId::ALL
            .iter()
            .filter_map(move |s| self.get(*s).map(|v| (*s, v)))
    }

    fn slot_ref(&self, slot: SlotId) -> &Option<String> {
        match slot {
            SlotId::TransactionType => &self.transaction_type,
            SlotId::BeneficiaryName => &self.beneficiary_name,
            SlotId::BeneficiaryAccount => &self.beneficiary_account,
            SlotId::BeneficiaryIfsc => &self.beneficiary_ifsc,
            SlotId::BeneficiaryBank => &self.beneficiary_bank,
            SlotId::Amount => &self.amount,
            SlotId::FromAccount => &self.from_account,
            SlotId::Remarks => &self.remarks,
            SlotId::Mmid => &self.mmid,
        }
    }

    fn slot_mut(&mut self, slot: SlotId) -> &mut Option<String> {
        match slot {
            SlotId::TransactionType => &mut self.transaction_type,
            SlotId::BeneficiaryName => &mut self.beneficiary_name,
            SlotId::BeneficiaryAccount => &mut self.beneficiary_account,
            SlotId::BeneficiaryIfsc => &mut self.beneficiary_ifsc,
            SlotId::BeneficiaryBank => &mut self.beneficiary_bank,
            SlotId::Amount => &mut self.amount,
            SlotId::FromAccount => &mut self.from_account,
            SlotId::Remarks => &mut self.remarks,
            SlotId::Mmid => &mut self.mmid,
        }
    }
}

/// The partially or fully filled slot set for one transfer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_type: TransferMethod,
    pub beneficiary_name: Option<String>,
    pub beneficiary_account: Option<String>,
    pub beneficiary_ifsc: Option<String>,
    pub beneficiary_bank: Option<String>,
    pub amount: Option<String>,
    pub from_account: Option<String>,
    pub remarks: Option<String>,
    pub mmid: Option<String>,
}

impl TransactionRecord {
    /// Empty record with the default transfer method
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a slot. The transfer method is always present.
    pub fn get(&self, slot: SlotId) -> Option<&str> {
        match slot {
            SlotId::TransactionType => Some(self.transaction_type.as_str()),
            SlotId::BeneficiaryName => self.beneficiary_name.as_deref(),
            SlotId::BeneficiaryAccount => self.beneficiary_account.as_deref(),
            SlotId::BeneficiaryIfsc => self.beneficiary_ifsc.as_deref(),
            SlotId::BeneficiaryBank => self.beneficiary_bank.as_deref(),
            SlotId::Amount => self.amount.as_deref(),
            SlotId::FromAccount => self.from_account.as_deref(),
            SlotId::Remarks => self.remarks.as_deref(),
            SlotId::Mmid => self.mmid.as_deref(),
        }
    }

    pub fn is_set(&self, slot: SlotId) -> bool {
        self.get(slot).is_some()
    }

    /// Clear one slot. Clearing the transfer method resets it to the default.
    pub fn clear(&mut self, slot: SlotId) {
        match slot {
            SlotId::TransactionType => self.transaction_type = TransferMethod::default(),
            SlotId::BeneficiaryName => self.beneficiary_name = None,
            SlotId::BeneficiaryAccount => self.beneficiary_account = None,
            SlotId::BeneficiaryIfsc => self.beneficiary_ifsc = None,
            SlotId::BeneficiaryBank => self.beneficiary_bank = None,
            SlotId::Amount => self.amount = None,
            SlotId::FromAccount => self.from_account = None,
            SlotId::Remarks => self.remarks = None,
            SlotId::Mmid => self.mmid = None,
        }
    }

    /// Validate one candidate value and store it on success.
    ///
    /// A rejected value leaves the slot untouched.
    pub fn try_set(
        &mut self,
        slot: SlotId,
        value: &str,
        limits: &TransferLimits,
    ) -> Result<(), ValidationError> {
        let value = validation::validate_slot(slot, value, limits)?;
        match slot {
            SlotId::TransactionType => self.transaction_type = value.parse()?,
            SlotId::BeneficiaryName => self.beneficiary_name = Some(value),
            SlotId::BeneficiaryAccount => self.beneficiary_account = Some(value),
            SlotId::BeneficiaryIfsc => self.beneficiary_ifsc = Some(value),
            SlotId::BeneficiaryBank => self.beneficiary_bank = Some(value),
            SlotId::Amount => self.amount = Some(value),
            SlotId::FromAccount => self.from_account = Some(value),
            SlotId::Remarks => self.remarks = Some(value),
            SlotId::Mmid => self.mmid = Some(value),
        }
        Ok(())
    }

    /// Merge one turn's extraction into the record.
    ///
    /// Non-null values overwrite (last write wins); null entries never clear
    /// a slot. Values that fail validation are skipped and reported back.
    pub fn merge(
        &mut self,
        extraction: &ExtractionResult,
        limits: &TransferLimits,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for (slot, value) in extraction.values() {
            if let Err(e) = self.try_set(slot, value, limits) {
                tracing::debug!(field = %slot, error = %e, "Rejected extracted value");
                errors.push(e);
            }
        }
        errors
    }

    /// Missing slots from `required`, preserving its order
    pub fn missing(&self, required: &[SlotId]) -> Vec<SlotId> {
        required
            .iter()
            .copied()
            .filter(|s| !self.is_set(*s))
            .collect()
    }

    pub fn is_complete(&self, required: &[SlotId]) -> bool {
        required.iter().all(|s| self.is_set(*s))
    }

    /// Populated slots in record order, transfer method first
    pub fn filled(&self) -> Vec<(SlotId, &str)> {
        SlotId::ALL
            .iter()
            .filter_map(|s| self.get(*s).map(|v| (*s, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_record() -> TransactionRecord {
        TransactionRecord {
            transaction_type: TransferMethod::Neft,
            beneficiary_name: Some("John".into()),
            beneficiary_account: Some("123456789012".into()),
            beneficiary_ifsc: Some("HDFC0001234".into()),
            amount: Some("5000".into()),
            from_account: Some("987654321098".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_transfer_method_parse() {
        assert_eq!("imps".parse::<TransferMethod>().unwrap(), TransferMethod::Imps);
        assert_eq!(" NEFT ".parse::<TransferMethod>().unwrap(), TransferMethod::Neft);
        assert_eq!("Rtgs".parse::<TransferMethod>().unwrap(), TransferMethod::Rtgs);
        assert!("upi".parse::<TransferMethod>().is_err());
        assert_eq!(TransferMethod::default(), TransferMethod::Imps);
    }

    #[test]
    fn test_required_order() {
        assert_eq!(
            SlotId::required(true),
            vec![
                SlotId::BeneficiaryName,
                SlotId::BeneficiaryAccount,
                SlotId::BeneficiaryIfsc,
                SlotId::Amount,
                SlotId::FromAccount,
            ]
        );
        assert!(!SlotId::required(false).contains(&SlotId::FromAccount));
    }

    #[test]
    fn test_alias_resolution() {
        assert_eq!(SlotId::from_alias("name"), Some(SlotId::BeneficiaryName));
        assert_eq!(SlotId::from_alias("Account"), Some(SlotId::BeneficiaryAccount));
        assert_eq!(SlotId::from_alias("ifsc"), Some(SlotId::BeneficiaryIfsc));
        assert_eq!(SlotId::from_alias("amount"), Some(SlotId::Amount));
        assert_eq!(SlotId::from_alias("remarks"), Some(SlotId::Remarks));
        assert_eq!(SlotId::from_alias("from_account"), Some(SlotId::FromAccount));
        assert_eq!(SlotId::from_alias("transaction_type"), None);
        assert_eq!(SlotId::from_alias("colour"), None);
    }

    #[test]
    fn test_null_extraction_is_idempotent() {
        let mut record = complete_record();
        let before = record.clone();
        let errors = record.merge(&ExtractionResult::default(), &TransferLimits::default());
        assert!(errors.is_empty());
        assert_eq!(record, before);
    }

    #[test]
    fn test_merge_last_write_wins() {
        let limits = TransferLimits::default();
        let mut record = TransactionRecord::new();

        let mut first = ExtractionResult::default();
        first.set(SlotId::BeneficiaryName, "John");
        first.set(SlotId::Amount, "1000");
        record.merge(&first, &limits);

        let mut second = ExtractionResult::default();
        second.set(SlotId::Amount, "2,500");
        record.merge(&second, &limits);

        assert_eq!(record.beneficiary_name.as_deref(), Some("John"));
        assert_eq!(record.amount.as_deref(), Some("2500"));
    }

    #[test]
    fn test_merge_rejects_invalid_values() {
        let limits = TransferLimits::default();
        let mut record = complete_record();

        let mut extraction = ExtractionResult::default();
        extraction.set(SlotId::BeneficiaryAccount, "12AB34");
        extraction.set(SlotId::BeneficiaryIfsc, "hdfc0001234");
        extraction.set(SlotId::Remarks, "rent");
        let errors = record.merge(&extraction, &limits);

        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidBeneficiaryAccount,
                ValidationError::InvalidIfsc
            ]
        );
        assert_eq!(record.beneficiary_account.as_deref(), Some("123456789012"));
        assert_eq!(record.beneficiary_ifsc.as_deref(), Some("HDFC0001234"));
        assert_eq!(record.remarks.as_deref(), Some("rent"));
    }

    #[test]
    fn test_missing_and_complete() {
        let required = SlotId::required(true);
        let mut record = TransactionRecord::new();
        assert_eq!(record.missing(&required), required);
        assert!(!record.is_complete(&required));

        record = complete_record();
        assert!(record.missing(&required).is_empty());
        assert!(record.is_complete(&required));

        record.clear(SlotId::Amount);
        assert_eq!(record.missing(&required), vec![SlotId::Amount]);
    }

    #[test]
    fn test_transfer_method_always_set() {
        let mut record = TransactionRecord::new();
        assert_eq!(record.get(SlotId::TransactionType), Some("IMPS"));
        record.transaction_type = TransferMethod::Rtgs;
        record.clear(SlotId::TransactionType);
        assert_eq!(record.transaction_type, TransferMethod::Imps);
    }

    #[test]
    fn test_extraction_deserialize_missing_keys() {
        let result: ExtractionResult =
            serde_json::from_str(r#"{"beneficiary_name": "Asha", "amount": null}"#).unwrap();
        assert_eq!(result.get(SlotId::BeneficiaryName), Some("Asha"));
        assert!(result.get(SlotId::Amount).is_none());
        assert!(result.get(SlotId::Mmid).is_none());
        assert!(!result.is_empty());
    }
}
