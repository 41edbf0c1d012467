//! Error types for the wager ledger
//!
//! This module defines all errors surfaced by the ledger API. Every failure
//! is returned to the caller as a typed result; nothing is silently
//! swallowed.
//!
//! # Error Categories
//!
//! - **Validation**: malformed amount or type/method/metadata combination
//! - **Conflict**: external reference reused with different substance
//! - **NotFound**: unknown transaction id or external reference
//! - **InvalidTransition**: lifecycle edge not permitted from current state
//! - **InsufficientFunds**: debit exceeds the current balance
//! - **ContentionRetryExhausted**: per-user serialization could not commit
//!   within the bounded retries; safe to retry after backoff
//! - **ExternalGatewayError**: opaque adapter failure, not retried here
//! - **Store**: operation against a closed or broken store handle

use super::transaction::{TransactionId, TransactionStatus, UserId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the wager ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Creation request failed validation
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the request
        message: String,
    },

    /// External reference already bound to a different transaction
    ///
    /// A retry carrying the same user, type, and amount is answered with the
    /// existing transaction instead; this error means the reference was
    /// reused for different substance.
    #[error("external reference '{reference}' is already in use")]
    Conflict {
        /// The conflicting idempotency key
        reference: String,
    },

    /// Unknown transaction id or external reference
    #[error("transaction not found: {key}")]
    NotFound {
        /// The id or reference that failed to resolve
        key: String,
    },

    /// Lifecycle edge not permitted from the transaction's current state
    ///
    /// Terminal states are immutable; any edge out of them fails with this
    /// error and performs no mutation.
    #[error("transaction {id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Debit settlement exceeds the user's current balance
    ///
    /// The transaction is transitioned to FAILED and no balance mutation
    /// occurs.
    #[error("insufficient funds for user {user}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        user: UserId,
        balance: Decimal,
        requested: Decimal,
    },

    /// Per-user settlement lock could not be acquired within the bounded
    /// retries
    ///
    /// The atomic unit either committed in full or not at all; the caller
    /// may retry after backoff.
    #[error("settlement for user {user} contended after {attempts} attempts")]
    ContentionRetryExhausted { user: UserId, attempts: u32 },

    /// Opaque failure surfaced from a confirmation adapter
    #[error("provider '{provider}' error: {message}")]
    ExternalGatewayError { provider: String, message: String },

    /// The ledger store handle is closed or its state is unusable
    #[error("ledger store error: {message}")]
    Store { message: String },
}

// Helper constructors, one per variant

impl LedgerError {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }

    /// Create a Conflict error
    pub fn conflict(reference: impl Into<String>) -> Self {
        LedgerError::Conflict {
            reference: reference.into(),
        }
    }

    /// Create a NotFound error
    pub fn not_found(key: impl Into<String>) -> Self {
        LedgerError::NotFound { key: key.into() }
    }

    /// Create an InvalidTransition error
    pub fn invalid_transition(
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Self {
        LedgerError::InvalidTransition { id, from, to }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(user: UserId, balance: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            user,
            balance,
            requested,
        }
    }

    /// Create a ContentionRetryExhausted error
    pub fn contention(user: UserId, attempts: u32) -> Self {
        LedgerError::ContentionRetryExhausted { user, attempts }
    }

    /// Create an ExternalGatewayError
    pub fn gateway(provider: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::ExternalGatewayError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a Store error
    pub fn store(message: impl Into<String>) -> Self {
        LedgerError::Store {
            message: message.into(),
        }
    }
}
