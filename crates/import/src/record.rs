use ledgerline_core::{AccountId, ImportTransaction, TransactionKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

use crate::date::{normalize_date, DateFormatError};

pub const NO_DESCRIPTION: &str = "No description";

/// One `<STMTTRN>` as the tokenizer produced it. Every field is optional
/// and scalar values may arrive as strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawOfxTransaction {
    #[serde(rename = "TRNTYPE", default, deserialize_with = "scalar_text")]
    pub trn_type: Option<String>,
    #[serde(rename = "DTPOSTED", default, deserialize_with = "scalar_text")]
    pub date_posted: Option<String>,
    #[serde(rename = "TRNAMT", default, deserialize_with = "scalar_text")]
    pub amount: Option<String>,
    #[serde(rename = "FITID", default, deserialize_with = "scalar_text")]
    pub fit_id: Option<String>,
    #[serde(rename = "NAME", default, deserialize_with = "scalar_text")]
    pub name: Option<String>,
    #[serde(rename = "MEMO", default, deserialize_with = "scalar_text")]
    pub memo: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawOfxTransaction {
    pub fn from_value(value: &Value) -> Result<Self, TransformError> {
        if !value.is_object() {
            return Err(TransformError::Malformed(format!(
                "expected an element, found {}",
                kind_of(value)
            )));
        }
        RawOfxTransaction::deserialize(value).map_err(|e| TransformError::Malformed(e.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),
    #[error("Missing amount")]
    MissingAmount,
    #[error(transparent)]
    Date(#[from] DateFormatError),
    #[error("Malformed transaction: {0}")]
    Malformed(String),
}

/// Map a raw statement line onto the ledger's import shape.
///
/// The amount sign is dropped; `TRNTYPE` alone decides the kind.
pub fn transform_record(
    raw: &RawOfxTransaction,
    account_id: &AccountId,
    currency: Option<&str>,
) -> Result<ImportTransaction, TransformError> {
    let amount = parse_amount(raw.amount.as_deref().ok_or(TransformError::MissingAmount)?)?.abs();
    let kind = TransactionKind::from_ofx_type(raw.trn_type.as_deref());

    let description = raw
        .memo
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or(NO_DESCRIPTION)
        .to_string();

    let transacted_date = normalize_date(raw.date_posted.as_deref().unwrap_or_default())?;

    Ok(ImportTransaction {
        account_id: account_id.clone(),
        destination_account_id: None,
        name: raw.name.clone().filter(|n| !n.is_empty()),
        description,
        amount,
        transacted_date,
        category_id: None,
        currency: currency.map(str::to_string),
        kind,
        fit_id: raw.fit_id.clone(),
        memo: raw.memo.clone(),
    })
}

/// Parse a signed OFX amount exactly.
///
/// Accepts a leading `+`, exponents, `,` as thousands separator, and a lone
/// `,` as the decimal mark (`-42,50`). Magnitudes beyond what `Decimal`
/// holds (about 7.9e28) are rejected as invalid.
fn parse_amount(s: &str) -> Result<Decimal, TransformError> {
    let trimmed = s.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let decimal_comma = !unsigned.contains('.') && unsigned.matches(',').count() == 1;
    let normalized = if decimal_comma {
        unsigned.replace(',', ".")
    } else {
        unsigned.replace(',', "")
    };

    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| TransformError::InvalidAmount(s.to_string()))
}

fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "nothing",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "text",
        Value::Array(_) => "a list",
        Value::Object(_) => "an element",
    }
}
