use ledgerline_core::{AccountId, ImportTransaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::currency::extract_currency;
use crate::locate::locate_transactions;
use crate::record::{transform_record, RawOfxTransaction};
use crate::rules::CategoryRuleEngine;
use crate::sgml::{OfxTokenizer, SgmlTokenizer, TokenizeError};

/// Entity tag attached to every terminal import error.
pub const ERROR_ENTITY: &str = "ofx_import";
pub const NO_TRANSACTIONS_MESSAGE: &str = "No transactions found in OFX file";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub file_content: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
}

impl ImportRequest {
    pub fn new(file_content: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            file_content: Some(file_content.into()),
            account_id: Some(account_id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStatistics {
    pub total_records: usize,
    pub successful_records: usize,
    pub failed_records: usize,
}

impl ImportStatistics {
    fn from_counts(total_records: usize, successful_records: usize) -> Self {
        Self {
            total_records,
            successful_records,
            failed_records: total_records - successful_records,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub transactions: Vec<ImportTransaction>,
    pub statistics: ImportStatistics,
    pub errors: Vec<String>,
}

/// Failures that abort an import outright. Per-record problems never
/// surface here; they are reported inside [`ImportResult::errors`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImportError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    InvalidContent(String),
    #[error("Failed to parse OFX file: {0}")]
    Parse(#[from] TokenizeError),
    #[error("OFX file contains no data")]
    NoData,
}

impl ImportError {
    /// Stable machine-readable category for clients.
    pub fn category(&self) -> &'static str {
        match self {
            ImportError::InvalidRequest(_) => "invalidrequest",
            ImportError::InvalidContent(_) => "invalidcontent",
            ImportError::Parse(_) => "parseerror",
            ImportError::NoData => "nodata",
        }
    }

    pub fn entity(&self) -> &'static str {
        ERROR_ENTITY
    }
}

/// Orchestrates: validate → tokenize → locate → transform each record.
///
/// Holds no per-import state, so one instance can serve concurrent calls.
pub struct OfxImporter<T: OfxTokenizer = SgmlTokenizer> {
    tokenizer: T,
    rules: Option<CategoryRuleEngine>,
}

impl OfxImporter<SgmlTokenizer> {
    pub fn new() -> Self {
        Self::with_tokenizer(SgmlTokenizer)
    }
}

impl Default for OfxImporter<SgmlTokenizer> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: OfxTokenizer> OfxImporter<T> {
    pub fn with_tokenizer(tokenizer: T) -> Self {
        Self {
            tokenizer,
            rules: None,
        }
    }

    /// Categorize successfully transformed records with `rules`.
    pub fn with_rules(mut self, rules: CategoryRuleEngine) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn import(&self, request: &ImportRequest) -> Result<ImportResult, ImportError> {
        let (content, account_id) = validate(request)?;

        let import_id = Uuid::new_v4();
        let span = tracing::info_span!("ofx_import", %import_id, account_id = %account_id);
        let _entered = span.enter();

        let doc = match self.tokenizer.tokenize(content) {
            Ok(Some(doc)) if !doc.is_null() => doc,
            Ok(_) => {
                tracing::info!("tokenizer returned no document");
                return Err(ImportError::NoData);
            }
            Err(e) => {
                tracing::info!(error = %e, "OFX file rejected by tokenizer");
                return Err(e.into());
            }
        };

        Ok(self.import_document(&doc, &account_id))
    }

    /// Transform an already tokenized document. Never fails as a whole.
    pub fn import_document(&self, doc: &Value, account_id: &AccountId) -> ImportResult {
        let (records, located) = locate_transactions(doc);
        tracing::debug!(?located, records = records.len(), "located transaction list");

        if records.is_empty() {
            tracing::info!("no transactions found");
            return ImportResult {
                transactions: Vec::new(),
                statistics: ImportStatistics::default(),
                errors: vec![NO_TRANSACTIONS_MESSAGE.to_string()],
            };
        }

        let currency = extract_currency(doc);
        let mut transactions = Vec::with_capacity(records.len());
        let mut errors = Vec::new();

        for (index, node) in records.iter().enumerate() {
            let position = index + 1;
            let transformed = RawOfxTransaction::from_value(node)
                .and_then(|raw| transform_record(&raw, account_id, currency.as_deref()));
            match transformed {
                Ok(mut tx) => {
                    if let Some(rules) = &self.rules {
                        rules.categorize(&mut tx);
                    }
                    transactions.push(tx);
                }
                Err(e) => {
                    tracing::warn!(record = position, error = %e, "skipping transaction");
                    errors.push(format!("Transaction {position}: {e}"));
                }
            }
        }

        let statistics = ImportStatistics::from_counts(records.len(), transactions.len());
        tracing::info!(
            total = statistics.total_records,
            succeeded = statistics.successful_records,
            failed = statistics.failed_records,
            currency = currency.as_deref().unwrap_or("-"),
            "OFX import finished"
        );

        ImportResult {
            transactions,
            statistics,
            errors,
        }
    }
}

fn validate(request: &ImportRequest) -> Result<(&str, AccountId), ImportError> {
    let content = request
        .file_content
        .as_deref()
        .ok_or_else(|| ImportError::InvalidRequest("file_content is required".to_string()))?;
    let account_id = request
        .account_id
        .as_deref()
        .and_then(|raw| AccountId::parse(raw).ok())
        .ok_or_else(|| ImportError::InvalidRequest("account_id is required".to_string()))?;
    if content.trim().is_empty() {
        return Err(ImportError::InvalidContent(
            "file_content must not be empty".to_string(),
        ));
    }
    Ok((content, account_id))
}

/// Import with the default tokenizer and no categorization.
pub fn import_ofx_file(request: &ImportRequest) -> Result<ImportResult, ImportError> {
    OfxImporter::new().import(request)
}
