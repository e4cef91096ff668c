pub mod currency;
pub mod date;
pub mod locate;
pub mod ofx;
pub mod record;
pub mod rules;
pub mod sgml;

pub use currency::extract_currency;
pub use date::{normalize_date, DateFormatError};
pub use locate::{locate_transactions, Located};
pub use ofx::{
    import_ofx_file, ImportError, ImportRequest, ImportResult, ImportStatistics, OfxImporter,
};
pub use record::{transform_record, RawOfxTransaction, TransformError};
pub use rules::{CategoryRule, CategoryRuleEngine, MatchType, RulesError};
pub use sgml::{OfxTokenizer, SgmlTokenizer, TokenizeError};
