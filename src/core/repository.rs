//! Transaction repository
//!
//! Creates and reads transaction records. Creation validates the amount and
//! the type/method/metadata combination, and enforces external-reference
//! uniqueness: a retried request carrying the same reference and the same
//! substance receives the existing transaction instead of a duplicate, while
//! a reference reused for different substance is a `Conflict`.
//!
//! Listings are read-only, filterable by type and status, and paginated with
//! a deterministic recency-first order.

use crate::core::ledger_store::{InsertOutcome, LedgerStore};
use crate::types::{
    CreateTransaction, LedgerError, Page, PageRequest, PaymentMethod, Transaction, TransactionFilter,
    TransactionId, TransactionMetadata, TransactionType, UserId,
};
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::debug;

/// Repository over the ledger store's transaction records
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    store: Arc<LedgerStore>,
}

impl TransactionRepository {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        TransactionRepository { store }
    }

    /// Create a new PENDING transaction
    ///
    /// # Errors
    ///
    /// - `Validation` if the amount is not positive or the
    ///   type/method/metadata combination is invalid
    /// - `Conflict` if the external reference is bound to a transaction with
    ///   different user, type, or amount
    ///
    /// A retry carrying an existing reference with matching substance
    /// returns the existing transaction (idempotent creation).
    pub fn create(&self, request: CreateTransaction) -> Result<Transaction, LedgerError> {
        validate(&request)?;

        let tx = Transaction::new(request.clone(), self.store.next_seq());
        match self.store.insert_unique(tx)? {
            InsertOutcome::Created(tx) => {
                debug!(
                    id = %tx.id,
                    user = %tx.user_id,
                    tx_type = %tx.tx_type,
                    amount = %tx.amount,
                    "transaction created"
                );
                Ok(tx)
            }
            InsertOutcome::Duplicate(existing) => {
                if existing.user_id == request.user_id
                    && existing.tx_type == request.tx_type
                    && existing.amount == request.amount
                {
                    debug!(id = %existing.id, "idempotent creation replay");
                    Ok(existing)
                } else {
                    Err(LedgerError::conflict(
                        request.external_reference.unwrap_or_default(),
                    ))
                }
            }
        }
    }

    /// Look up a transaction by id
    pub fn find_by_id(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.store
            .transaction(id)
            .ok_or_else(|| LedgerError::not_found(id.to_string()))
    }

    /// Look up a transaction by external reference
    pub fn find_by_reference(&self, reference: &str) -> Result<Transaction, LedgerError> {
        let id = self
            .store
            .resolve_reference(reference)
            .ok_or_else(|| LedgerError::not_found(reference))?;
        self.find_by_id(id)
    }

    /// List transactions, optionally restricted to one user
    ///
    /// `user = None` is the administrative listing across all users. Results
    /// are recency-first: creation time descending, with the store sequence
    /// as the deterministic tiebreaker.
    pub fn list(
        &self,
        user: Option<UserId>,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Page<Transaction> {
        let mut matching: Vec<Transaction> = self
            .store
            .all_transactions()
            .into_iter()
            .filter(|tx| user.map_or(true, |u| tx.user_id == u))
            .filter(|tx| filter.matches(tx))
            .collect();
        matching.sort_by_key(|tx| (Reverse(tx.created_at), Reverse(tx.seq)));
        Page::slice(matching, page)
    }
}

/// Validate a creation request before any record is built
fn validate(request: &CreateTransaction) -> Result<(), LedgerError> {
    if request.amount <= Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "amount must be positive, got {}",
            request.amount
        )));
    }

    match request.tx_type {
        TransactionType::Deposit | TransactionType::Withdrawal => {
            if request.payment_method.is_none() {
                return Err(LedgerError::validation(format!(
                    "{} requires a payment method",
                    request.tx_type
                )));
            }
        }
        TransactionType::Bet | TransactionType::Win | TransactionType::Bonus => {
            if request.payment_method.is_some() {
                return Err(LedgerError::validation(format!(
                    "{} carries no payment method",
                    request.tx_type
                )));
            }
        }
    }

    if !request
        .metadata
        .matches(request.tx_type, request.payment_method)
    {
        return Err(LedgerError::validation(format!(
            "metadata does not match {} / {:?}",
            request.tx_type, request.payment_method
        )));
    }

    // The PIX destination key is the whole point of a PIX withdrawal
    if request.tx_type == TransactionType::Withdrawal
        && request.payment_method == Some(PaymentMethod::Pix)
    {
        if let TransactionMetadata::PixWithdrawal { pix_key, .. } = &request.metadata {
            if pix_key.trim().is_empty() {
                return Err(LedgerError::validation(
                    "PIX withdrawal requires a destination key",
                ));
            }
        }
    }

    Ok(())
}
