//! Prompt templates and canned replies

use finassist_core::{SlotId, TransactionRecord};

/// Built-in extraction instruction. `{transcript}` and `{message}` are
/// substituted per turn.
pub const EXTRACTION_PROMPT: &str = r#"You are assisting with a legitimate banking application that helps customers manage their finances.
This is standard financial service functionality similar to what banks provide through their apps and websites.

Extract the following transfer details from the current user message, using the conversation so far for context:
1. transaction_type: "IMPS", "NEFT" or "RTGS" if the user names one
2. beneficiary_name: the person receiving the money, usually after "to" or "for"; capitalize it
3. beneficiary_account: the recipient's account number, digits only, usually near "account", "acc" or "no"
4. beneficiary_ifsc: the bank IFSC code, usually after "ifsc"; keep its case exactly as written
5. beneficiary_bank: the recipient's bank name
6. amount: a bare number, without currency words or symbols such as "rs", "rupees" or "₹"
7. from_account: the user's own account number, digits only
8. remarks: a short purpose or note for the transfer
9. mmid: the 7-digit Mobile Money Identifier, only for IMPS

Return only a valid JSON object with exactly these keys:
{"transaction_type": null, "beneficiary_name": null, "beneficiary_account": null, "beneficiary_ifsc": null, "beneficiary_bank": null, "amount": null, "from_account": null, "remarks": null, "mmid": null}

Use a string for every value that appears in the current message and null for everything else.
Only respond with the JSON, no other text.

Conversation so far:
{transcript}

Current user message:
{message}"#;

/// System instruction for the stateless `/chat` pass-through
pub const CHAT_SYSTEM_PROMPT: &str = r#"You are 'FinAssist', a helpful and secure chatbot within the 'SecureBank' mobile banking application. Your purpose is to help customers make one-time fund transfers using RTGS, IMPS or NEFT. The user is already logged in, so never ask for credentials.

Collect the beneficiary name, beneficiary account number, beneficiary bank name, IFSC code, transfer amount (₹), optional purpose of transfer, preferred transfer method, and the MMID when IMPS is selected. Then show a summary with the user's masked account number (e.g. XXXXXXXXXXXX1234) and ask the user to confirm. Offer to edit any detail.

When the user confirms, respond with ONLY this JSON:
{"status": "success", "message": "Transfer request submitted successfully.", "data": {"userAccountNumber": string, "beneficiaryName": string, "beneficiaryAccountNumber": string, "beneficiaryBankName": string, "beneficiaryIFSC": string, "transferAmount": number, "purposeOfTransfer": string or null, "transferMethod": "IMPS" | "NEFT" | "RTGS", "mmiNumber": string or null, "timestamp": ISO 8601 string, "confirmationPageLink": "/transfer/confirmation"}}

You cannot perform the transfer yourself; you only collect the details and build the JSON."#;

pub const GREETING: &str =
    "Hi there! Welcome to SecureBank. I can help you transfer money safely and easily.";

pub const CANCELLED_MESSAGE: &str = "Thank you for using our services. Have a great day!";

pub const COMPLETED_MESSAGE: &str =
    "Your transaction has been submitted successfully! Thank you for using our service.";

pub const UNKNOWN_CHANGE_MESSAGE: &str = "I'm not sure what you want to change. You can say 'change name', 'change account', 'change ifsc', 'change amount' or 'change remarks'.";

/// Fill the extraction template.
///
/// Placeholders are substituted in one pass over the template, so text
/// inside the transcript or message is never treated as a placeholder.
pub fn render_extraction_prompt(template: &str, transcript: &str, message: &str) -> String {
    let transcript = transcript.trim_end();
    let mut out = String::with_capacity(template.len() + transcript.len() + message.len());
    let mut rest = template;

    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{transcript}") {
            out.push_str(transcript);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{message}") {
            out.push_str(message);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Remove template and comment markers from a free-form chat prompt
pub fn sanitize_prompt(prompt: &str) -> String {
    let mut cleaned = prompt.to_string();
    for marker in ["{{", "}}", "/*", "*/"] {
        cleaned = cleaned.replace(marker, "");
    }
    cleaned.trim().to_string()
}

/// Question asked when `slot` is the next field to collect
pub fn field_prompt(slot: SlotId) -> &'static str {
    match slot {
        SlotId::BeneficiaryName => {
            "Could you please tell me the name of the person you're sending money to?"
        }
        SlotId::BeneficiaryAccount => "What is the account number of the recipient?",
        SlotId::BeneficiaryIfsc => "Could you provide the IFSC code of the recipient's bank?",
        SlotId::Amount => "How much would you like to transfer?",
        SlotId::FromAccount => {
            "Which account would you like to transfer from? Please provide your account number."
        }
        SlotId::Remarks => {
            "Would you like to add any remarks to this transaction? If not, just say 'no remarks'."
        }
        SlotId::BeneficiaryBank => "Which bank does the recipient hold their account with?",
        SlotId::Mmid => "What is the recipient's 7-digit MMID?",
        SlotId::TransactionType => "Would you like to send this by IMPS, NEFT or RTGS?",
    }
}

/// Summary shown once every required field is present
pub fn confirmation_summary(record: &TransactionRecord) -> String {
    let mut summary = String::from("Thank you! Here's a summary of your transaction details:\n\n");

    for (slot, value) in record.filled() {
        if slot == SlotId::Amount {
            summary.push_str(&format!("- {}: Rs. {}\n", slot.display_name(), value));
        } else {
            summary.push_str(&format!("- {}: {}\n", slot.display_name(), value));
        }
    }

    summary.push_str("\nIs this information correct? You can:\n");
    summary.push_str("- Say 'change <field>' to edit a detail (name, account, ifsc, amount or remarks)\n");
    summary.push_str("- Say 'complete' to finalize the transaction\n");
    summary.push_str("- Say 'cancel' to cancel\n");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use finassist_core::TransferMethod;

    #[test]
    fn test_render_extraction_prompt() {
        let prompt = render_extraction_prompt(
            EXTRACTION_PROMPT,
            "User: hi\nAssistant: hello\n",
            "send 500 to Ravi",
        );
        assert!(prompt.contains("Conversation so far:\nUser: hi\nAssistant: hello\n\nCurrent"));
        assert!(prompt.ends_with("Current user message:\nsend 500 to Ravi"));
        assert!(!prompt.contains("{transcript}"));
    }

    #[test]
    fn test_render_leaves_user_braces_alone() {
        let prompt = render_extraction_prompt(
            "CTX={transcript} MSG={message} JSON={\"amount\": null}",
            "User: my note says {message}\n",
            "typed {transcript} here",
        );
        assert_eq!(
            prompt,
            "CTX=User: my note says {message} MSG=typed {transcript} here JSON={\"amount\": null}"
        );
    }

    #[test]
    fn test_sanitize_prompt() {
        assert_eq!(
            sanitize_prompt("  send {{amount}} /* now */ "),
            "send amount  now"
        );
        assert_eq!(sanitize_prompt("{{}}"), "");
    }

    #[test]
    fn test_field_prompts_are_distinct() {
        let prompts: std::collections::HashSet<_> =
            SlotId::ALL.iter().map(|s| field_prompt(*s)).collect();
        assert_eq!(prompts.len(), SlotId::ALL.len());
    }

    #[test]
    fn test_confirmation_summary() {
        let record = TransactionRecord {
            transaction_type: TransferMethod::Neft,
            beneficiary_name: Some("John".into()),
            amount: Some("5000".into()),
            remarks: Some("none".into()),
            ..Default::default()
        };
        let summary = confirmation_summary(&record);

        assert!(summary.contains("- Transaction Type: NEFT\n"));
        assert!(summary.contains("- Recipient's Name: John\n"));
        assert!(summary.contains("- Amount: Rs. 5000\n"));
        assert!(summary.contains("- Remarks: none\n"));
        assert!(!summary.contains("IFSC Code:"));
        assert!(summary.contains("'complete'"));
    }
}
