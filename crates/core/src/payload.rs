//! Final transfer request payload
//!
//! The one structured artifact the assistant produces. Nothing here executes
//! a transfer; the payload is handed to the caller as is.

use crate::error::{Error, Result};
use crate::transaction::{SlotId, TransactionRecord, TransferMethod};
use crate::validation::mask_account_number;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUCCESS_MESSAGE: &str = "Transfer request submitted successfully.";
pub const CONFIRMATION_PAGE_LINK: &str = "/transfer/confirmation";

/// Remarks value meaning "the user declined to add remarks"
pub const NO_REMARKS: &str = "none";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub status: String,
    pub message: String,
    pub data: TransferData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferData {
    pub user_account_number: String,
    pub beneficiary_name: String,
    pub beneficiary_account_number: String,
    pub beneficiary_bank_name: Option<String>,
    #[serde(rename = "beneficiaryIFSC")]
    pub beneficiary_ifsc: String,
    pub transfer_amount: f64,
    pub purpose_of_transfer: Option<String>,
    pub transfer_method: TransferMethod,
    pub mmi_number: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub confirmation_page_link: String,
}

impl TransferRequest {
    /// Build the payload from a complete record.
    ///
    /// `default_from_account` is used when the record carries no source
    /// account. Fails with [`Error::IncompleteRecord`] naming every missing slot.
    pub fn from_record(
        record: &TransactionRecord,
        default_from_account: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let from_account = record.from_account.as_deref().or(default_from_account);

        let mut missing = record.missing(&SlotId::required(false));
        if from_account.is_none() {
            missing.push(SlotId::FromAccount);
        }
        let (
            Some(name),
            Some(account),
            Some(ifsc),
            Some(amount),
            Some(from_account),
        ) = (
            record.beneficiary_name.as_deref(),
            record.beneficiary_account.as_deref(),
            record.beneficiary_ifsc.as_deref(),
            record.amount.as_deref(),
            from_account,
        )
        else {
            return Err(Error::IncompleteRecord { missing });
        };

        // Amounts are validated on merge; a bad one here means the record was
        // built some other way
        let transfer_amount: f64 = amount
            .replace(',', "")
            .parse()
            .map_err(|_| Error::Internal(format!("stored amount is not numeric: {}", amount)))?;

        let purpose_of_transfer = record
            .remarks
            .as_deref()
            .filter(|r| !r.eq_ignore_ascii_case(NO_REMARKS))
            .map(str::to_string);

        let mmi_number = match record.transaction_type {
            TransferMethod::Imps => record.mmid.clone(),
            _ => None,
        };

        Ok(Self {
            status: "success".to_string(),
            message: SUCCESS_MESSAGE.to_string(),
            data: TransferData {
                user_account_number: mask_account_number(from_account),
                beneficiary_name: name.to_string(),
                beneficiary_account_number: account.to_string(),
                beneficiary_bank_name: record.beneficiary_bank.clone(),
                beneficiary_ifsc: ifsc.to_string(),
                transfer_amount,
                purpose_of_transfer,
                transfer_method: record.transaction_type,
                mmi_number,
                timestamp,
                confirmation_page_link: CONFIRMATION_PAGE_LINK.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TransactionRecord {
        TransactionRecord {
            transaction_type: TransferMethod::Imps,
            beneficiary_name: Some("Priya Sharma".into()),
            beneficiary_account: Some("50100012345678".into()),
            beneficiary_ifsc: Some("HDFC0001234".into()),
            beneficiary_bank: Some("HDFC Bank".into()),
            amount: Some("2500".into()),
            from_account: Some("1234567890121234".into()),
            remarks: Some("rent".into()),
            mmid: Some("9001234".into()),
        }
    }

    #[test]
    fn test_payload_shape() {
        let request = TransferRequest::from_record(&record(), None, Utc::now()).unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["status"], "success");
        assert_eq!(json["message"], SUCCESS_MESSAGE);
        let data = &json["data"];
        assert_eq!(data["userAccountNumber"], "XXXXXXXXXXXX1234");
        assert_eq!(data["beneficiaryName"], "Priya Sharma");
        assert_eq!(data["beneficiaryAccountNumber"], "50100012345678");
        assert_eq!(data["beneficiaryBankName"], "HDFC Bank");
        assert_eq!(data["beneficiaryIFSC"], "HDFC0001234");
        assert_eq!(data["transferAmount"], 2500.0);
        assert_eq!(data["purposeOfTransfer"], "rent");
        assert_eq!(data["transferMethod"], "IMPS");
        assert_eq!(data["mmiNumber"], "9001234");
        assert_eq!(data["confirmationPageLink"], "/transfer/confirmation");
        assert!(data["timestamp"].is_string());
    }

    #[test]
    fn test_unparsable_stored_amount() {
        let mut record = record();
        record.amount = Some("lots".into());
        assert!(matches!(
            TransferRequest::from_record(&record, None, Utc::now()),
            Err(Error::Internal(_))
        ));
    }

    #[test]
    fn test_declined_remarks_and_neft() {
        let mut record = record();
        record.remarks = Some("none".into());
        record.transaction_type = TransferMethod::Neft;

        let request = TransferRequest::from_record(&record, None, Utc::now()).unwrap();
        assert!(request.data.purpose_of_transfer.is_none());
        assert!(request.data.mmi_number.is_none());
    }

    #[test]
    fn test_default_from_account() {
        let mut record = record();
        record.from_account = None;

        let err = TransferRequest::from_record(&record, None, Utc::now()).unwrap_err();
        assert_eq!(err.missing_fields(), &[SlotId::FromAccount]);

        let request =
            TransferRequest::from_record(&record, Some("998877665544"), Utc::now()).unwrap();
        assert_eq!(request.data.user_account_number, "XXXXXXXX5544");
    }

    #[test]
    fn test_incomplete_record() {
        let err = TransferRequest::from_record(&TransactionRecord::new(), Some("998877665544"), Utc::now())
            .unwrap_err();
        assert_eq!(
            err.missing_fields(),
            &[
                SlotId::BeneficiaryName,
                SlotId::BeneficiaryAccount,
                SlotId::BeneficiaryIfsc,
                SlotId::Amount
            ]
        );
    }
}
