//! Core data types for the wager ledger
//!
//! This module contains the transaction data model, the per-user wallet,
//! listing support, and the error taxonomy used throughout the system.

pub mod error;
pub mod query;
pub mod transaction;
pub mod wallet;

pub use error::LedgerError;
pub use query::{Page, PageRequest, TransactionFilter};
pub use transaction::{
    CreateTransaction, PaymentMethod, PixKeyType, StatusChange, Transaction, TransactionId,
    TransactionMetadata, TransactionStatus, TransactionType, UserId,
};
pub use wallet::Wallet;
