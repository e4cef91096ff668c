pub mod account;
pub mod transaction;

pub use account::{AccountError, AccountId};
pub use transaction::{ImportTransaction, TransactionKind};
