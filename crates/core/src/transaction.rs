use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::account::AccountId;

/// Direction of an imported transaction.
///
/// Taken from the statement's own type tag rather than the amount sign;
/// anything unrecognized lands on `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Debit,
    Credit,
    Transfer,
    Unknown,
}

impl TransactionKind {
    /// Case-insensitive lookup of an OFX `TRNTYPE` token.
    pub fn from_ofx_type(token: Option<&str>) -> Self {
        match token.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("debit") => TransactionKind::Debit,
            Some("credit") => TransactionKind::Credit,
            Some("xfer") => TransactionKind::Transfer,
            _ => TransactionKind::Unknown,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Debit => write!(f, "DEBIT"),
            TransactionKind::Credit => write!(f, "CREDIT"),
            TransactionKind::Transfer => write!(f, "TRANSFER"),
            TransactionKind::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A statement line normalized for insertion into the ledger.
///
/// `amount` is always non-negative; direction lives in `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportTransaction {
    pub account_id: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub transacted_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn sample() -> ImportTransaction {
        ImportTransaction {
            account_id: AccountId::parse("acc-1").unwrap(),
            destination_account_id: None,
            name: None,
            description: "Coffee".to_string(),
            amount: Decimal::from_str("42.50").unwrap(),
            transacted_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            category_id: None,
            currency: Some("USD".to_string()),
            kind: TransactionKind::Debit,
            fit_id: Some("TXN001".to_string()),
            memo: Some("Coffee".to_string()),
        }
    }

    #[test]
    fn kind_lookup_is_case_insensitive() {
        assert_eq!(TransactionKind::from_ofx_type(Some("DEBIT")), TransactionKind::Debit);
        assert_eq!(TransactionKind::from_ofx_type(Some("debit")), TransactionKind::Debit);
        assert_eq!(TransactionKind::from_ofx_type(Some("Credit")), TransactionKind::Credit);
        assert_eq!(TransactionKind::from_ofx_type(Some("XFER")), TransactionKind::Transfer);
    }

    #[test]
    fn kind_lookup_defaults_to_unknown() {
        assert_eq!(TransactionKind::from_ofx_type(Some("FOO")), TransactionKind::Unknown);
        assert_eq!(TransactionKind::from_ofx_type(Some("")), TransactionKind::Unknown);
        assert_eq!(TransactionKind::from_ofx_type(None), TransactionKind::Unknown);
        // POS and ATM are real OFX types but carry no mapping here.
        assert_eq!(TransactionKind::from_ofx_type(Some("POS")), TransactionKind::Unknown);
    }

    #[test]
    fn kind_serializes_uppercase() {
        assert_eq!(serde_json::to_value(TransactionKind::Transfer).unwrap(), json!("TRANSFER"));
        assert_eq!(TransactionKind::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn transaction_serializes_camel_case_and_omits_absent_fields() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["accountId"], json!("acc-1"));
        assert_eq!(value["transactedDate"], json!("2024-01-15"));
        assert_eq!(value["amount"], json!(42.5));
        assert_eq!(value["kind"], json!("DEBIT"));
        assert_eq!(value["fitId"], json!("TXN001"));
        assert!(value.get("destinationAccountId").is_none());
        assert!(value.get("categoryId").is_none());
        assert!(value.get("name").is_none());
    }
}
