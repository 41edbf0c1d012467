//! Ledger store: the authoritative in-memory data store
//!
//! This module provides the `LedgerStore`, the durable handle holding
//! transaction records, the external-reference index, per-user wallets, and
//! settlement markers. It is constructed explicitly (`open`) and injected
//! into the components that need it; there is no process-wide singleton.
//!
//! # Concurrency
//!
//! All maps are `DashMap`s, so independent keys never contend. Each wallet is
//! guarded by its own `Mutex` handle; the settlement engine acquires it with
//! `try_lock` and a bounded retry loop, which serializes settlements per user
//! while letting different users proceed fully in parallel.
//!
//! # Atomic primitives
//!
//! - `insert_unique` holds the reference-index entry across the uniqueness
//!   check and the insert, so two concurrent creations with the same
//!   external reference can never both win.
//! - `update_transaction` mutates a record under its map entry lock and
//!   returns the updated copy.
//! - Settlement markers are written only while the owning user's wallet lock
//!   is held, which is what makes "check marker, apply delta, transition
//!   status" a single atomic unit.

use crate::types::{LedgerError, Transaction, TransactionId, UserId, Wallet};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Proof that a transaction's balance delta has been applied
///
/// Tied 1:1 to the transaction id; this marker, not the transaction status,
/// is the authoritative settlement-idempotency guard.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementRecord {
    pub transaction_id: TransactionId,
    pub user_id: UserId,

    /// The signed delta that was applied
    pub delta: Decimal,

    /// Wallet balance immediately after applying the delta
    pub balance_after: Decimal,

    pub applied_at: DateTime<Utc>,
}

/// Outcome of an insert attempt with a unique external reference
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The transaction was stored
    Created(Transaction),

    /// The external reference is already bound; here is its transaction
    Duplicate(Transaction),
}

/// Authoritative store for transactions, wallets, and settlement markers
///
/// Open at startup, close at shutdown. Mutating operations against a closed
/// handle fail with `LedgerError::Store`.
#[derive(Debug)]
pub struct LedgerStore {
    /// All transaction records by id
    transactions: DashMap<TransactionId, Transaction>,

    /// External reference -> transaction id (creation-time idempotency)
    by_reference: DashMap<String, TransactionId>,

    /// Per-user wallet guards (settlement-time serialization)
    wallets: DashMap<UserId, Arc<Mutex<Wallet>>>,

    /// Settlement markers by transaction id (settlement-time idempotency)
    settlements: DashMap<TransactionId, SettlementRecord>,

    /// Monotonic sequence for deterministic listing order
    seq: AtomicU64,

    open: AtomicBool,
}

impl LedgerStore {
    /// Open a fresh store handle
    pub fn open() -> Self {
        LedgerStore {
            transactions: DashMap::new(),
            by_reference: DashMap::new(),
            wallets: DashMap::new(),
            settlements: DashMap::new(),
            seq: AtomicU64::new(0),
            open: AtomicBool::new(true),
        }
    }

    /// Close the handle; subsequent mutations fail with `Store`
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<(), LedgerError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(LedgerError::store("ledger store handle is closed"))
        }
    }

    /// Next monotonic sequence number
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert a transaction, enforcing external-reference uniqueness
    ///
    /// The reference-index entry is held across the check and the insert, so
    /// exactly one of any set of concurrent inserts with the same reference
    /// is `Created`; the others receive `Duplicate` with the winner's record.
    pub fn insert_unique(&self, tx: Transaction) -> Result<InsertOutcome, LedgerError> {
        self.ensure_open()?;
        match &tx.external_reference {
            None => {
                self.transactions.insert(tx.id, tx.clone());
                Ok(InsertOutcome::Created(tx))
            }
            Some(reference) => match self.by_reference.entry(reference.clone()) {
                Entry::Occupied(existing) => {
                    let existing_id = *existing.get();
                    let existing_tx = self
                        .transactions
                        .get(&existing_id)
                        .map(|entry| entry.value().clone())
                        .ok_or_else(|| {
                            LedgerError::store("reference index points at a missing transaction")
                        })?;
                    Ok(InsertOutcome::Duplicate(existing_tx))
                }
                Entry::Vacant(slot) => {
                    // Record first, then publish the reference: a reader that
                    // resolves the reference always finds the record.
                    self.transactions.insert(tx.id, tx.clone());
                    slot.insert(tx.id);
                    Ok(InsertOutcome::Created(tx))
                }
            },
        }
    }

    /// Read a transaction by id
    pub fn transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.transactions.get(&id).map(|entry| entry.value().clone())
    }

    /// Resolve an external reference to a transaction id
    pub fn resolve_reference(&self, reference: &str) -> Option<TransactionId> {
        self.by_reference.get(reference).map(|entry| *entry.value())
    }

    /// Mutate a transaction under its entry lock
    ///
    /// The closure either applies its change and returns `Ok`, or returns an
    /// error and leaves the record untouched (closures must not partially
    /// mutate before failing). Returns the updated copy.
    pub fn update_transaction<F>(
        &self,
        id: TransactionId,
        f: F,
    ) -> Result<Transaction, LedgerError>
    where
        F: FnOnce(&mut Transaction) -> Result<(), LedgerError>,
    {
        self.ensure_open()?;
        let mut entry = self
            .transactions
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found(id.to_string()))?;
        f(entry.value_mut())?;
        Ok(entry.value().clone())
    }

    /// Get or create the wallet guard for a user
    pub fn wallet_handle(&self, user_id: UserId) -> Arc<Mutex<Wallet>> {
        self.wallets
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(Wallet::new(user_id))))
            .clone()
    }

    /// Read a user's current balance
    ///
    /// Waits for any in-flight settlement on this user; a user with no
    /// wallet yet reads as zero.
    pub fn balance(&self, user_id: UserId) -> Result<Decimal, LedgerError> {
        let handle = self.wallet_handle(user_id);
        let wallet = handle
            .lock()
            .map_err(|_| LedgerError::store("wallet lock poisoned"))?;
        Ok(wallet.balance)
    }

    /// Read the settlement marker for a transaction, if any
    pub fn settlement(&self, id: TransactionId) -> Option<SettlementRecord> {
        self.settlements.get(&id).map(|entry| entry.value().clone())
    }

    /// Record a settlement marker
    ///
    /// Callers must hold the owning user's wallet lock; the marker and the
    /// balance write belong to the same atomic unit.
    pub(crate) fn record_settlement(&self, record: SettlementRecord) {
        self.settlements.insert(record.transaction_id, record);
    }

    /// Snapshot of all transaction records
    ///
    /// Order is arbitrary; the repository sorts for listings.
    pub fn all_transactions(&self) -> Vec<Transaction> {
        self.transactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
